use liblzma::write::XzEncoder;
use std::io::{Error, Write};

/// Closes a writer pipeline stage and hands back the inner writer.
///
/// Archive writers are layered (buffer, compressor, buffer); `finish`
/// flushes and finalizes each stage so the chain can be torn down in order
/// without losing trailing bytes.
pub trait Finish<O> {
    fn finish(self) -> Result<O, Error>;
}

impl<W: Write> Finish<W> for XzEncoder<W> {
    fn finish(self) -> Result<W, Error> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct TestFinisher {
        inner: Cursor<Vec<u8>>,
        should_fail: bool,
    }

    impl Finish<Cursor<Vec<u8>>> for TestFinisher {
        fn finish(self) -> Result<Cursor<Vec<u8>>, Error> {
            if self.should_fail {
                Err(Error::other("Test failure"))
            } else {
                Ok(self.inner)
            }
        }
    }

    #[test]
    fn test_finish_trait_success() {
        let finisher = TestFinisher {
            inner: Cursor::new(vec![1, 2, 3]),
            should_fail: false,
        };

        let returned_cursor = finisher.finish().unwrap();
        assert_eq!(returned_cursor.get_ref(), &vec![1, 2, 3]);
    }

    #[test]
    fn test_finish_trait_failure() {
        let finisher = TestFinisher {
            inner: Cursor::new(vec![1, 2, 3]),
            should_fail: true,
        };

        let error = finisher.finish().unwrap_err();
        assert_eq!(error.to_string(), "Test failure");
    }

    #[test]
    fn test_xz_encoder_finish_impl() {
        let encoder = XzEncoder::new(Cursor::new(Vec::new()), 1);
        assert!(encoder.finish().is_ok());
    }
}
