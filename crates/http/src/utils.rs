//! Small crate-private helpers.

/// Return early with `$error` when `$predicate` does not hold.
///
/// The decoders use this for their hard limits, where falling through
/// would mean buffering without bound.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
