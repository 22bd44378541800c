/// Fixed role assignment of the virtual registers used by the decode routine.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VirtualRegister {
    /// Exception object used for returning from a gadget to the dispatcher.
    Exception = 0,
    /// Virtual program counter that selects the next gadget. Owned by the
    /// dispatcher, never written by gadgets.
    ProgramCounter = 1,
    /// Secret key; holds the result length while the array is allocated.
    Key = 2,
    /// Character array of decoded values, returned at the end.
    Result = 3,
    /// Encrypted, then decrypted, character.
    Scratch = 4,
    /// Index into the result array.
    Index = 5,
    Spare = 6,
}

impl VirtualRegister {
    pub const COUNT: usize = 7;

    pub const REGNUM_SET: [VirtualRegister; Self::COUNT] = [
        Self::Exception,
        Self::ProgramCounter,
        Self::Key,
        Self::Result,
        Self::Scratch,
        Self::Index,
        Self::Spare,
    ];

    pub const fn reg_number(self) -> u8 {
        match self {
            Self::Exception => 0,
            Self::ProgramCounter => 1,
            Self::Key => 2,
            Self::Result => 3,
            Self::Scratch => 4,
            Self::Index => 5,
            Self::Spare => 6,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        let ret = match n {
            0 => Self::Exception,
            1 => Self::ProgramCounter,
            2 => Self::Key,
            3 => Self::Result,
            4 => Self::Scratch,
            5 => Self::Index,
            6 => Self::Spare,
            _ => return None,
        };
        Some(ret)
    }

    /// Operand form taken by the encoders.
    pub fn operand(self) -> i64 {
        i64::from(self.reg_number())
    }
}

#[test]
fn can_cast() {
    let a: Vec<_> = VirtualRegister::REGNUM_SET
        .iter()
        .map(|&x| x as u8)
        .collect();
    let b: Vec<_> = (0..=6).collect();
    assert_eq!(a, b);
}

#[test]
fn all_eq() {
    for &reg in &VirtualRegister::REGNUM_SET {
        assert_eq!(reg.reg_number(), reg as u8, "reg = {:?}", reg);
        assert_eq!(VirtualRegister::from_number(reg.reg_number()), Some(reg));
    }
    assert_eq!(VirtualRegister::from_number(7), None);
}

#[test]
fn fits_in_a_nibble() {
    // alloc-array and xor-int/2addr address registers through 4-bit fields
    assert!(VirtualRegister::REGNUM_SET
        .iter()
        .all(|r| r.reg_number() < 16));
}
