//! Skill scores relative to a reference forecast.

use icecap_io::Field;

use crate::error::MetricError;

/// Stand-in for an exact zero error so the ratio stays finite.
pub const SKILL_EPSILON: f64 = 1e-11;

/// Errors and skill of a forecast against a reference.
#[derive(Debug, Clone)]
pub struct SkillScore {
    /// Forecast error, exact zeros preserved.
    pub forecast: Field,
    /// Reference error, exact zeros preserved.
    pub reference: Field,
    /// `clip(1 - forecast / reference, -1, 1)`.
    pub skill: Field,
}

/// Skill of `error_fc` relative to `error_ref`.
///
/// Zero errors are replaced by [`SKILL_EPSILON`] for the ratio only: a
/// perfect forecast against a perfect reference scores 0, against an
/// imperfect one 1. The returned error fields keep their exact zeros.
///
/// # Errors
///
/// Returns [`MetricError::Io`] if the two fields do not broadcast.
pub fn compute_skill_score(error_fc: &Field, error_ref: &Field) -> Result<SkillScore, MetricError> {
    let guarded_fc = guard_zero(error_fc);
    let guarded_ref = guard_zero(error_ref);
    let skill = guarded_fc.zip_with(&guarded_ref, |f, r| (1.0 - f / r).clamp(-1.0, 1.0))?;
    Ok(SkillScore {
        forecast: restore_zero(&guarded_fc),
        reference: restore_zero(&guarded_ref),
        skill,
    })
}

/// Replace exact zeros by [`SKILL_EPSILON`].
pub(crate) fn guard_zero(field: &Field) -> Field {
    field.map(|v| if v == 0.0 { SKILL_EPSILON } else { v })
}

/// Undo [`guard_zero`].
pub(crate) fn restore_zero(field: &Field) -> Field {
    field.map(|v| if v == SKILL_EPSILON { 0.0 } else { v })
}

#[cfg(test)]
mod tests {
    use super::*;
    use icecap_io::Dim;
    use ndarray::{ArrayD, IxDyn};

    fn field(values: Vec<f64>) -> Field {
        let n = values.len();
        Field::new("e", vec![Dim::X], ArrayD::from_shape_vec(IxDyn(&[n]), values).unwrap()).unwrap()
    }

    #[test]
    fn skill_is_clipped() {
        let s = compute_skill_score(&field(vec![0.5, 3.0]), &field(vec![1.0, 1.0])).unwrap();
        assert_eq!(s.skill.data().as_slice().unwrap(), &[0.5, -1.0]);
    }

    #[test]
    fn nan_propagates() {
        let s = compute_skill_score(&field(vec![f64::NAN]), &field(vec![1.0])).unwrap();
        assert!(s.skill.data()[[0]].is_nan());
    }

    #[test]
    fn perfect_against_imperfect_is_one() {
        let s = compute_skill_score(&field(vec![0.0]), &field(vec![0.2])).unwrap();
        approx::assert_relative_eq!(s.skill.data()[[0]], 1.0, epsilon = 1e-9);
        assert_eq!(s.forecast.data()[[0]], 0.0);
    }

    #[test]
    fn perfect_against_perfect_is_zero() {
        let s = compute_skill_score(&field(vec![0.0, 0.0]), &field(vec![0.0, 0.0])).unwrap();
        assert_eq!(s.skill.data().as_slice().unwrap(), &[0.0, 0.0]);
        assert_eq!(s.forecast.data().as_slice().unwrap(), &[0.0, 0.0]);
        assert_eq!(s.reference.data().as_slice().unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn rescoring_the_returned_errors_changes_nothing() {
        let fc = field(vec![0.0, 0.0, 0.5, 3.0, 0.1]);
        let reference = field(vec![0.0, 0.2, 1.0, 1.0, 0.0]);
        let first = compute_skill_score(&fc, &reference).unwrap();
        let second = compute_skill_score(&first.forecast, &first.reference).unwrap();

        assert_eq!(second.forecast.data(), first.forecast.data());
        assert_eq!(second.reference.data(), first.reference.data());
        assert_eq!(second.skill.data(), first.skill.data());
        assert_eq!(first.forecast.data(), fc.data());
        assert_eq!(first.reference.data(), reference.data());
    }
}
