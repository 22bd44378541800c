/// Concatenates bytes, byte arrays, slices and vectors into one `Vec<u8>`,
/// reserving the full length up front.
///
/// ```ignore
/// let t = c![0x13, 4_u8, 0x0102_i16.to_le_bytes()];
/// assert_eq!(t, [0x13, 4, 2, 1]);
/// ```
macro_rules! c {
    () => {
        Vec::<u8>::new()
    };
    ($($x:expr),+ $(,)?) => {
        {
            use $crate::macros::Concat;
            let parts: &[&dyn Concat] = &[$(&$x),+];
            let len = parts.iter().map(|p| p.clen()).sum();
            let mut ret = Vec::with_capacity(len);
            for part in parts {
                part.extend_other(&mut ret);
            }
            ret
        }
    };
}

pub(crate) trait Concat {
    fn clen(&self) -> usize;
    fn extend_other(&self, other: &mut Vec<u8>);
}

impl Concat for u8 {
    fn clen(&self) -> usize {
        1
    }
    fn extend_other(&self, other: &mut Vec<u8>) {
        other.push(*self)
    }
}

impl Concat for [u8] {
    fn clen(&self) -> usize {
        self.len()
    }
    fn extend_other(&self, other: &mut Vec<u8>) {
        other.extend_from_slice(self)
    }
}

impl<const N: usize> Concat for [u8; N] {
    fn clen(&self) -> usize {
        N
    }
    fn extend_other(&self, other: &mut Vec<u8>) {
        other.extend_from_slice(self)
    }
}

impl Concat for Vec<u8> {
    fn clen(&self) -> usize {
        self.len()
    }
    fn extend_other(&self, other: &mut Vec<u8>) {
        other.extend_from_slice(self)
    }
}

impl<T: Concat + ?Sized> Concat for &T {
    fn clen(&self) -> usize {
        (**self).clen()
    }
    fn extend_other(&self, other: &mut Vec<u8>) {
        (**self).extend_other(other)
    }
}

#[test]
fn empty() {
    let t = c![];
    assert!(t.is_empty());
}

#[test]
fn mixed_parts() {
    let v = vec![7_u8, 8];
    let t = c![0x13_u8, b"ab", 0x0102_u16.to_le_bytes(), v, &v[..1]];
    assert_eq!(t, [0x13, b'a', b'b', 0x02, 0x01, 7, 8, 7]);
}

#[test]
fn trailing_comma() {
    let a = c![1_u8, 2_u8, 3_u8];
    let b = c![1_u8, 2_u8, 3_u8,];
    assert_eq!(a, b);
}

#[allow(unused_results)]
#[test]
fn doesnt_consume_parts() {
    let t0 = vec![1_u8];
    let t1 = vec![2_u8];
    c![t0, t1];
    assert_eq!(t0, [1]);
    assert_eq!(t1, [2]);
}

#[test]
fn evaluates_once() {
    let mut calls = 0;
    let mut next = || {
        calls += 1;
        0xaa_u8
    };
    let t = c![next(), 0xbb_u8];
    assert_eq!(t, [0xaa, 0xbb]);
    assert_eq!(calls, 1);
}
