pub mod herd;
pub mod luck;
pub mod rebin;
pub mod report;
pub mod totals;
pub mod user;

pub use rebin::{BinWidth, SpreadFilter};
pub use report::{SpreadReport, UserInputs, UserParams, UserReport};
pub use user::Participant;

/// Median of the finite values; the mean of the middle pair for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some((v[mid - 1] + v[mid]) / 2.0)
    } else {
        Some(v[mid])
    }
}
