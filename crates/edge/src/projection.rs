//! Forward map projections on a spherical Earth.
//!
//! Only the projections cache files are written in are supported. Target
//! points are given in longitude/latitude and projected into the grid's
//! native coordinates to find their nearest cell.

use icecap_io::Projection;

use crate::error::EdgeError;

/// Earth radius in metres for projected coordinates.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const ANTIPODE_TOLERANCE: f64 = 1e-12;

/// A projection with forward equations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapProjection {
    /// Azimuthal stereographic, polar or oblique, with scale factor `k0` at
    /// the centre.
    Stereographic { lat0: f64, lon0: f64, k0: f64 },
    /// Lambert azimuthal equal-area.
    LambertAzimuthalEqualArea { lat0: f64, lon0: f64 },
    /// Equirectangular with coordinates in degrees.
    PlateCarree { lon0: f64 },
}

impl MapProjection {
    /// Build from projection metadata.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::UnsupportedProjection`] for unknown names.
    pub fn from_metadata(projection: &Projection) -> Result<Self, EdgeError> {
        let lon0 = projection.central_longitude.unwrap_or(0.0);
        let polar = |lat0: f64| {
            let k0 = projection
                .true_scale_latitude
                .map_or(1.0, |ts| (1.0 + ts.abs().to_radians().sin()) / 2.0);
            MapProjection::Stereographic { lat0, lon0, k0 }
        };
        match projection.name.as_str() {
            "NorthPolarStereo" => Ok(polar(90.0)),
            "SouthPolarStereo" => Ok(polar(-90.0)),
            "Stereographic" => {
                let lat0 = projection.central_latitude.unwrap_or(0.0);
                if lat0.abs() == 90.0 {
                    Ok(polar(lat0))
                } else {
                    Ok(MapProjection::Stereographic { lat0, lon0, k0: 1.0 })
                }
            }
            "LambertAzimuthalEqualArea" => Ok(MapProjection::LambertAzimuthalEqualArea {
                lat0: projection.central_latitude.unwrap_or(0.0),
                lon0,
            }),
            "PlateCarree" => Ok(MapProjection::PlateCarree { lon0 }),
            other => Err(EdgeError::UnsupportedProjection {
                name: other.to_string(),
            }),
        }
    }

    /// Projected `(x, y)` of a geographic point, `None` where the projection
    /// is undefined (the antipode of an azimuthal centre).
    pub fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (x, y) = match *self {
            MapProjection::Stereographic { lat0, lon0, k0 } => {
                let (phi, phi0, dl) = angles(lat, lat0, lon, lon0);
                let denom = 1.0 + phi0.sin() * phi.sin() + phi0.cos() * phi.cos() * dl.cos();
                if denom <= ANTIPODE_TOLERANCE {
                    return None;
                }
                let k = 2.0 * k0 / denom;
                (
                    EARTH_RADIUS_M * k * phi.cos() * dl.sin(),
                    EARTH_RADIUS_M * k * (phi0.cos() * phi.sin() - phi0.sin() * phi.cos() * dl.cos()),
                )
            }
            MapProjection::LambertAzimuthalEqualArea { lat0, lon0 } => {
                let (phi, phi0, dl) = angles(lat, lat0, lon, lon0);
                let denom = 1.0 + phi0.sin() * phi.sin() + phi0.cos() * phi.cos() * dl.cos();
                if denom <= ANTIPODE_TOLERANCE {
                    return None;
                }
                let k = (2.0 / denom).sqrt();
                (
                    EARTH_RADIUS_M * k * phi.cos() * dl.sin(),
                    EARTH_RADIUS_M * k * (phi0.cos() * phi.sin() - phi0.sin() * phi.cos() * dl.cos()),
                )
            }
            MapProjection::PlateCarree { lon0 } => (wrap_lon(lon - lon0), lat),
        };
        (x.is_finite() && y.is_finite()).then_some((x, y))
    }
}

fn angles(lat: f64, lat0: f64, lon: f64, lon0: f64) -> (f64, f64, f64) {
    (lat.to_radians(), lat0.to_radians(), (lon - lon0).to_radians())
}

/// Longitude difference wrapped into `[-180, 180)`.
fn wrap_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn named(name: &str) -> Projection {
        Projection::named(name)
    }

    #[test]
    fn north_pole_is_origin() {
        let p = MapProjection::from_metadata(&named("NorthPolarStereo")).unwrap();
        let (x, y) = p.forward(0.0, 90.0).unwrap();
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn polar_stereo_orientation() {
        let p = MapProjection::from_metadata(&named("NorthPolarStereo")).unwrap();
        // lon 0 points down the negative y axis, lon 90 along positive x
        let (x, y) = p.forward(0.0, 80.0).unwrap();
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert!(y < 0.0);
        let (x, _) = p.forward(90.0, 80.0).unwrap();
        assert!(x > 0.0);
    }

    #[test]
    fn true_scale_shrinks_centre() {
        let mut meta = named("NorthPolarStereo");
        meta.true_scale_latitude = Some(70.0);
        let MapProjection::Stereographic { k0, .. } = MapProjection::from_metadata(&meta).unwrap() else {
            panic!("expected stereographic");
        };
        assert_relative_eq!(k0, (1.0 + 70f64.to_radians().sin()) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn laea_preserves_distance_from_centre_on_meridian() {
        let mut meta = named("LambertAzimuthalEqualArea");
        meta.central_latitude = Some(90.0);
        let p = MapProjection::from_metadata(&meta).unwrap();
        let (x, y) = p.forward(90.0, 0.0).unwrap();
        assert_relative_eq!(x, EARTH_RADIUS_M * 2f64.sqrt(), max_relative = 1e-9);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn plate_carree_wraps() {
        let mut meta = named("PlateCarree");
        meta.central_longitude = Some(180.0);
        let p = MapProjection::from_metadata(&meta).unwrap();
        assert_eq!(p.forward(170.0, 10.0), Some((-10.0, 10.0)));
        assert_eq!(p.forward(-170.0, 10.0), Some((10.0, 10.0)));
    }

    #[test]
    fn antipode_is_undefined() {
        let p = MapProjection::from_metadata(&named("NorthPolarStereo")).unwrap();
        assert!(p.forward(0.0, -90.0).is_none());
    }

    #[test]
    fn unknown_projection() {
        let err = MapProjection::from_metadata(&named("Mollweide")).unwrap_err();
        assert!(matches!(err, EdgeError::UnsupportedProjection { .. }));
    }
}
