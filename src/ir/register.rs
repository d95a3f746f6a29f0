//! Register identity, register sets and register naming.
//!
//! Registers are identified by a small integer index. Liveness and def-use
//! tracking work on *canonical* indices: sub-registers that alias the same
//! physical register (`al`, `ah` and `eax` on x86) share one position in a
//! [`RegisterSet`]. Mapping a raw index to its canonical index and to a
//! display name is the job of a [`RegisterFile`], supplied by whoever lifted
//! the instructions.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt,
    ops::{BitAnd, BitOr, BitOrAssign, Sub, SubAssign},
};

use crate::ir::Address;

/// Largest number of canonical registers a [`RegisterSet`] can hold.
pub const REGISTER_LIMIT: usize = 64;

/// A fixed-width set of canonical register indices.
///
/// The set fits a single machine word, is `Copy`, and all set algebra is
/// branch free. Indices at or beyond [`REGISTER_LIMIT`] are never members;
/// inserting one is rejected rather than panicking so that malformed lifter
/// output degrades to imprecision instead of aborting the analysis.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegisterSet(u64);

impl RegisterSet {
    /// The empty set.
    pub const EMPTY: RegisterSet = RegisterSet(0);

    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        RegisterSet(0)
    }

    /// Creates a set from the given register indices, ignoring out-of-range ones.
    #[must_use]
    pub fn from_indices(indices: &[u16]) -> Self {
        let mut set = RegisterSet::new();
        for &reg in indices {
            set.insert(reg);
        }
        set
    }

    /// Adds a register. Returns `false` if the index is out of range.
    pub fn insert(&mut self, reg: u16) -> bool {
        if usize::from(reg) >= REGISTER_LIMIT {
            return false;
        }
        self.0 |= 1u64 << reg;
        true
    }

    /// Removes a register.
    pub fn remove(&mut self, reg: u16) {
        if usize::from(reg) < REGISTER_LIMIT {
            self.0 &= !(1u64 << reg);
        }
    }

    /// Returns `true` if the register is a member.
    #[must_use]
    pub const fn contains(&self, reg: u16) -> bool {
        (reg as usize) < REGISTER_LIMIT && (self.0 & (1u64 << reg)) != 0
    }

    /// Returns `true` if no register is a member.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns the number of members.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Removes every member.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Adds every member of `other`. Returns `true` if `self` changed.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let old = self.0;
        self.0 |= other.0;
        old != self.0
    }

    /// Removes every member of `other`. Returns `true` if `self` changed.
    pub fn difference_with(&mut self, other: &Self) -> bool {
        let old = self.0;
        self.0 &= !other.0;
        old != self.0
    }

    /// Keeps only members also in `other`. Returns `true` if `self` changed.
    pub fn intersect_with(&mut self, other: &Self) -> bool {
        let old = self.0;
        self.0 &= other.0;
        old != self.0
    }

    /// Iterates the members in ascending order.
    pub fn iter(&self) -> RegisterSetIter {
        RegisterSetIter { bits: self.0 }
    }

    /// Renders the set as `{eax, ecx}` using the given register names.
    #[must_use]
    pub fn display<'a>(&self, registers: &'a dyn RegisterFile) -> RegisterSetDisplay<'a> {
        RegisterSetDisplay {
            set: *self,
            registers,
        }
    }
}

impl BitOr for RegisterSet {
    type Output = RegisterSet;

    fn bitor(self, rhs: Self) -> Self::Output {
        RegisterSet(self.0 | rhs.0)
    }
}

impl BitAnd for RegisterSet {
    type Output = RegisterSet;

    fn bitand(self, rhs: Self) -> Self::Output {
        RegisterSet(self.0 & rhs.0)
    }
}

impl Sub for RegisterSet {
    type Output = RegisterSet;

    fn sub(self, rhs: Self) -> Self::Output {
        RegisterSet(self.0 & !rhs.0)
    }
}

impl BitOrAssign for RegisterSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl SubAssign for RegisterSet {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 &= !rhs.0;
    }
}

impl FromIterator<u16> for RegisterSet {
    fn from_iter<T: IntoIterator<Item = u16>>(iter: T) -> Self {
        let mut set = RegisterSet::new();
        for reg in iter {
            set.insert(reg);
        }
        set
    }
}

impl fmt::Debug for RegisterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for reg in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{reg}")?;
            first = false;
        }
        write!(f, "}}")
    }
}

/// Iterator over the members of a [`RegisterSet`].
pub struct RegisterSetIter {
    bits: u64,
}

impl Iterator for RegisterSetIter {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bits == 0 {
            return None;
        }
        let reg = self.bits.trailing_zeros();
        self.bits &= self.bits - 1;
        // trailing_zeros of a non-zero u64 is at most 63
        Some(reg as u16)
    }
}

/// Named rendering of a [`RegisterSet`], see [`RegisterSet::display`].
pub struct RegisterSetDisplay<'a> {
    set: RegisterSet,
    registers: &'a dyn RegisterFile,
}

impl fmt::Display for RegisterSetDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, reg) in self.set.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.registers.name(reg))?;
        }
        write!(f, "}}")
    }
}

/// Maps register indices to canonical indices and display names.
///
/// One implementation exists per target architecture. The analysis only
/// ever asks for [`canonical`](RegisterFile::canonical); names are used by
/// the code generator and diagnostic dumps.
pub trait RegisterFile: Send + Sync {
    /// Short architecture name, used in diagnostics.
    fn architecture(&self) -> &'static str;

    /// Number of canonical registers, at most [`REGISTER_LIMIT`].
    fn count(&self) -> usize;

    /// Maps a raw register index to its canonical (size-normalized) index.
    fn canonical(&self, reg: u16) -> u16 {
        reg
    }

    /// Returns the display name of a register, if the architecture knows it.
    fn lookup(&self, reg: u16) -> Option<&'static str>;

    /// Returns the display name of a register, falling back to `REGISTER_<n>`.
    fn name(&self, reg: u16) -> Cow<'static, str> {
        match self.lookup(reg) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("REGISTER_{reg}")),
        }
    }
}

/// Architecture-neutral register file naming registers `R0`, `R1`, ...
#[derive(Debug, Clone, Copy)]
pub struct GenericRegisters {
    count: usize,
}

impl GenericRegisters {
    /// Creates a register file with `count` registers, clamped to [`REGISTER_LIMIT`].
    #[must_use]
    pub fn new(count: usize) -> Self {
        GenericRegisters {
            count: count.min(REGISTER_LIMIT),
        }
    }
}

impl Default for GenericRegisters {
    fn default() -> Self {
        GenericRegisters::new(32)
    }
}

const GENERIC_NAMES: [&str; REGISTER_LIMIT] = [
    "R0", "R1", "R2", "R3", "R4", "R5", "R6", "R7", "R8", "R9", "R10", "R11", "R12", "R13", "R14",
    "R15", "R16", "R17", "R18", "R19", "R20", "R21", "R22", "R23", "R24", "R25", "R26", "R27",
    "R28", "R29", "R30", "R31", "R32", "R33", "R34", "R35", "R36", "R37", "R38", "R39", "R40",
    "R41", "R42", "R43", "R44", "R45", "R46", "R47", "R48", "R49", "R50", "R51", "R52", "R53",
    "R54", "R55", "R56", "R57", "R58", "R59", "R60", "R61", "R62", "R63",
];

impl RegisterFile for GenericRegisters {
    fn architecture(&self) -> &'static str {
        "generic"
    }

    fn count(&self) -> usize {
        self.count
    }

    fn lookup(&self, reg: u16) -> Option<&'static str> {
        let index = usize::from(reg);
        if index < self.count {
            GENERIC_NAMES.get(index).copied()
        } else {
            None
        }
    }
}

/// 32-bit x86 general purpose registers.
///
/// Indices 0-7 are the 32-bit registers in encoding order, 8-15 the byte
/// registers `al cl dl bl ah ch dh bh`, which share liveness with their
/// 32-bit parents.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86Registers;

impl X86Registers {
    /// Index of `eax`, the return value register.
    pub const EAX: u16 = 0;
    /// Index of `ecx`.
    pub const ECX: u16 = 1;
    /// Index of `edx`.
    pub const EDX: u16 = 2;
    /// Index of `ebx`.
    pub const EBX: u16 = 3;
    /// Index of `esp`.
    pub const ESP: u16 = 4;
    /// Index of `ebp`.
    pub const EBP: u16 = 5;
    /// Index of `esi`.
    pub const ESI: u16 = 6;
    /// Index of `edi`.
    pub const EDI: u16 = 7;
    /// Index of `al`.
    pub const AL: u16 = 8;
    /// Index of `ah`.
    pub const AH: u16 = 12;
}

const X86_NAMES: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "al", "cl", "dl", "bl", "ah", "ch",
    "dh", "bh",
];

impl RegisterFile for X86Registers {
    fn architecture(&self) -> &'static str {
        "x86"
    }

    fn count(&self) -> usize {
        8
    }

    fn canonical(&self, reg: u16) -> u16 {
        match reg {
            8..=15 => (reg - 8) & 3,
            _ => reg,
        }
    }

    fn lookup(&self, reg: u16) -> Option<&'static str> {
        X86_NAMES.get(usize::from(reg)).copied()
    }
}

/// 32-bit ARM core registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArmRegisters;

const ARM_NAMES: [&str; 16] = [
    "R0", "R1", "R2", "R3", "R4", "R5", "R6", "R7", "R8", "R9", "R10", "R11", "R12", "SP", "LR",
    "PC",
];

impl RegisterFile for ArmRegisters {
    fn architecture(&self) -> &'static str {
        "arm"
    }

    fn count(&self) -> usize {
        16
    }

    fn lookup(&self, reg: u16) -> Option<&'static str> {
        ARM_NAMES.get(usize::from(reg)).copied()
    }
}

/// Definition-use chain of one instruction.
///
/// Maps each register the instruction defines to the addresses of the later
/// instructions that read that definition. Registers iterate in ascending
/// order, addresses in program order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuChain {
    entries: BTreeMap<u16, Vec<Address>>,
}

impl DuChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        DuChain::default()
    }

    /// Records a use of `reg` at `address`.
    pub fn add(&mut self, reg: u16, address: Address) {
        self.entries.entry(reg).or_default().push(address);
    }

    /// Returns the use addresses recorded for `reg`.
    #[must_use]
    pub fn uses_of(&self, reg: u16) -> &[Address] {
        self.entries.get(&reg).map_or(&[], Vec::as_slice)
    }

    /// Returns the number of uses recorded for `reg`.
    #[must_use]
    pub fn count(&self, reg: u16) -> usize {
        self.uses_of(reg).len()
    }

    /// Returns the total number of entries over all registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns `true` if no use was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the only entry when the chain has exactly one.
    #[must_use]
    pub fn single(&self) -> Option<(u16, Address)> {
        let mut entries = self.iter();
        match (entries.next(), entries.next()) {
            (Some(entry), None) => Some(entry),
            _ => None,
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates `(register, use address)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u16, Address)> + '_ {
        self.entries
            .iter()
            .flat_map(|(reg, addresses)| addresses.iter().map(move |address| (*reg, *address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_set_basic() {
        let mut set = RegisterSet::new();
        assert!(set.is_empty());

        assert!(set.insert(0));
        assert!(set.insert(5));
        assert!(set.insert(63));
        assert!(!set.insert(64));

        assert_eq!(set.count(), 3);
        assert!(set.contains(5));
        assert!(!set.contains(6));
        assert!(!set.contains(200));

        set.remove(5);
        assert!(!set.contains(5));
        set.remove(900);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 63]);
    }

    #[test]
    fn test_register_set_algebra() {
        let a = RegisterSet::from_indices(&[0, 1, 2]);
        let b = RegisterSet::from_indices(&[2, 3]);

        assert_eq!(a | b, RegisterSet::from_indices(&[0, 1, 2, 3]));
        assert_eq!(a & b, RegisterSet::from_indices(&[2]));
        assert_eq!(a - b, RegisterSet::from_indices(&[0, 1]));

        let mut c = a;
        assert!(c.union_with(&b));
        assert!(!c.union_with(&b));
        assert!(c.difference_with(&a));
        assert_eq!(c, RegisterSet::from_indices(&[3]));
        assert!(!c.intersect_with(&b));
    }

    #[test]
    fn test_register_set_debug_and_display() {
        let set: RegisterSet = [1u16, 4].into_iter().collect();
        assert_eq!(format!("{set:?}"), "{1, 4}");
        assert_eq!(set.display(&X86Registers).to_string(), "{ecx, esp}");
        assert_eq!(RegisterSet::EMPTY.display(&X86Registers).to_string(), "{}");
    }

    #[test]
    fn test_register_names() {
        let generic = GenericRegisters::default();
        assert_eq!(generic.name(3), "R3");
        assert_eq!(generic.name(40), "REGISTER_40");

        assert_eq!(X86Registers.name(X86Registers::EBP), "ebp");
        assert_eq!(X86Registers.name(X86Registers::AH), "ah");
        assert_eq!(X86Registers.name(99), "REGISTER_99");

        assert_eq!(ArmRegisters.name(13), "SP");
        assert_eq!(ArmRegisters.name(15), "PC");
    }

    #[test]
    fn test_x86_canonical_byte_registers() {
        assert_eq!(X86Registers.canonical(X86Registers::AL), X86Registers::EAX);
        assert_eq!(X86Registers.canonical(X86Registers::AH), X86Registers::EAX);
        assert_eq!(X86Registers.canonical(11), X86Registers::EBX);
        assert_eq!(X86Registers.canonical(15), X86Registers::EBX);
        assert_eq!(X86Registers.canonical(X86Registers::ESI), X86Registers::ESI);
    }

    #[test]
    fn test_du_chain() {
        let mut chain = DuChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.single(), None);

        chain.add(1, 0x104);
        assert_eq!(chain.single(), Some((1, 0x104)));

        chain.add(1, 0x110);
        chain.add(0, 0x108);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.count(1), 2);
        assert_eq!(chain.uses_of(2), &[] as &[Address]);
        assert_eq!(chain.single(), None);
        assert_eq!(
            chain.iter().collect::<Vec<_>>(),
            vec![(0, 0x108), (1, 0x104), (1, 0x110)]
        );
    }
}
