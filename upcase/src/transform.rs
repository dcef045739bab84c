//! The byte transform applied to every write

/// Map `a..=z` to `A..=Z`, leave every other byte alone
#[must_use]
#[inline]
pub fn upcase_byte(b: u8) -> u8 {
    if b.is_ascii_lowercase() {
        b - (b'a' - b'A')
    } else {
        b
    }
}

/// Transform `buf` in place
pub fn upcase_in_place(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = upcase_byte(*b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_range_is_mapped() {
        for b in b'a'..=b'z' {
            assert_eq!(upcase_byte(b), b - 32);
        }
    }

    #[test]
    fn test_other_bytes_unchanged() {
        for b in (0..=u8::MAX).filter(|b| !b.is_ascii_lowercase()) {
            assert_eq!(upcase_byte(b), b);
        }
    }

    #[test]
    fn test_in_place() {
        let mut buf = *b"Hello, World! \xe9\xff";
        upcase_in_place(&mut buf);
        assert_eq!(&buf, b"HELLO, WORLD! \xe9\xff");
    }
}
