/// A coordinate in the discretized recombination-map space.
///
/// Loci are the engine's internal breakpoint coordinate system and are
/// distinct from physical [`Position`](crate::Position)s.  A
/// recombination map translates between the two.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
#[repr(transparent)]
pub struct Locus(i64);

impl Locus {
    /// Create a new Locus
    ///
    /// # Returns
    ///
    /// * `Some` if `locus` is non-negative
    /// * `None` otherwise
    pub fn new(locus: i64) -> Option<Self> {
        if locus >= 0 {
            Some(Self(locus))
        } else {
            None
        }
    }

    /// Create a new locus with a non-negative integer.
    ///
    /// # Panics
    ///
    /// Will panic if `locus` < 0.
    pub fn new_valid(locus: i64) -> Self {
        Self::new(locus).unwrap()
    }
}

impl PartialEq<i64> for Locus {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<Locus> for i64 {
    fn eq(&self, other: &Locus) -> bool {
        *self == other.0
    }
}

impl PartialOrd<i64> for Locus {
    fn partial_cmp(&self, other: &i64) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl PartialOrd<Locus> for i64 {
    fn partial_cmp(&self, other: &Locus) -> Option<std::cmp::Ordering> {
        self.partial_cmp(&other.0)
    }
}

impl TryFrom<i64> for Locus {
    type Error = crate::Error;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(crate::Error::LocusError(value))
    }
}

impl From<Locus> for i64 {
    fn from(value: Locus) -> Self {
        value.0
    }
}
