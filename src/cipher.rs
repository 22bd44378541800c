use crate::range::{ubyte, OutOfRange};

/// XORs every byte of `msg` with the single-byte `key`. Applying it twice with
/// the same key gives back `msg`.
pub fn encrypt(msg: &[u8], key: i64) -> Result<Vec<u8>, OutOfRange> {
    let key = ubyte(key)?;
    Ok(msg.iter().map(|c| c ^ key).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag() {
        assert_eq!(encrypt(b"flag", 0x42).unwrap(), b"\x24\x2e\x23\x25");
        assert_eq!(encrypt(b"", 0x42).unwrap(), b"");
    }

    #[test]
    fn key_must_be_a_byte() {
        assert!(encrypt(b"flag", 256).is_err());
        assert!(encrypt(b"flag", -1).is_err());
    }

    #[quickcheck]
    fn qc_self_inverse(msg: Vec<u8>, key: u8) -> bool {
        let key = i64::from(key);
        let once = encrypt(&msg, key).unwrap();
        once.len() == msg.len() && encrypt(&once, key).unwrap() == msg
    }
}
