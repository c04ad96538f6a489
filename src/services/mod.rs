// Business logic services

pub mod admission;
pub mod clients;
pub mod session;
pub mod settings;
pub mod stats;

use subtle::ConstantTimeEq;

/// Constant-time string comparison for credential checks
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equality() {
        assert!(constant_time_eq("suisuisui", "suisuisui"));
        assert!(!constant_time_eq("suisuisui", "suisuisuj"));
        assert!(!constant_time_eq("short", "longer-value"));
        assert!(constant_time_eq("", ""));
    }
}
