use std::fmt;
use std::io;

const CLOSED_PIPE_MESSAGE: &str = "io: read/write on closed pipe";
const TIMEOUT_MESSAGE: &str = "i/o timeout";

/// Error returned by any operation on a pipe end that has been closed.
pub fn closed_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, CLOSED_PIPE_MESSAGE)
}

/// Error returned when a read or write deadline passes.
pub fn deadline_exceeded() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, TIMEOUT_MESSAGE)
}

pub fn is_timeout(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::TimedOut
}

pub fn is_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected
    )
}

/// Every failure collected while tearing a connection down.
///
/// Close steps are independent: one failing never prevents the others from
/// running, so the caller gets the full list in the order the steps ran.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<io::Error>,
}

impl AggregateError {
    /// Collapses the collected failures, `None` when nothing failed.
    pub fn from_errors(errors: Vec<io::Error>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn errors(&self) -> &[io::Error] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<io::Error> {
        self.errors
    }
}

impl From<AggregateError> for io::Error {
    fn from(err: AggregateError) -> Self {
        if err.errors.len() == 1 {
            // A single cause keeps its kind for callers matching on it.
            let mut errors = err.errors;
            return errors.remove(0);
        }
        io::Error::other(err)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_no_errors_is_none() {
        assert!(AggregateError::from_errors(vec![]).is_none());
    }

    #[test]
    fn test_display_lists_every_cause() {
        let err = AggregateError::from_errors(vec![
            io::Error::other("channel gone"),
            io::Error::other("connection reset"),
        ])
        .expect("two errors were collected");

        assert_eq!(err.len(), 2);
        assert_eq!(err.to_string(), "channel gone, connection reset");
    }

    #[test]
    fn test_single_cause_keeps_kind() {
        let err = AggregateError::from_errors(vec![closed_pipe()]).expect("one error");
        let io_err: io::Error = err.into();
        assert!(is_closed(&io_err));
        assert!(!is_timeout(&io_err));
    }

    #[test]
    fn test_error_classes() {
        assert!(is_timeout(&deadline_exceeded()));
        assert!(!is_closed(&deadline_exceeded()));
        assert!(is_closed(&closed_pipe()));
        assert_eq!(closed_pipe().to_string(), CLOSED_PIPE_MESSAGE);
    }
}
