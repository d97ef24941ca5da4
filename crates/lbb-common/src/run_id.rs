//! Identifier of the current process run.
//!
//! `update_offices` stamps every row it rewrites with this value so a
//! materialisation pass can be traced back to the run that produced it.

use once_cell::sync::Lazy;
use ulid::Ulid;

static RUN_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// Same value for the lifetime of the process.
#[inline]
pub fn get() -> &'static str {
    &RUN_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_within_a_process() {
        assert_eq!(get(), get());
        assert_eq!(get().len(), 26);
        assert!(get().parse::<Ulid>().is_ok());
    }
}
