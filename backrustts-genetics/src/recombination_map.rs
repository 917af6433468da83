use backrustts_core::{Locus, Position};
use thiserror::Error;

/// Error type for recombination-map construction.
#[derive(Error, Debug, PartialEq)]
pub enum GeneticsError {
    /// Positions must begin at zero and strictly increase.
    #[error("Recombination map positions must start at 0 and strictly increase")]
    InvalidMapPositions,
    /// Rates must be finite and non-negative, one per interval.
    #[error("Invalid recombination rate: {found:?}")]
    InvalidRate {
        /// The invalid rate
        found: f64,
    },
    /// The number of loci must be positive, and must be exactly one
    /// when the map carries no recombination mass.
    #[error("Invalid number of loci")]
    InvalidNumLoci,
}

/// A piecewise-constant genetic-rate function over physical coordinates.
///
/// The map discretizes the genome into `num_loci` equal chunks of
/// *genetic* distance.  [`RecombinationMap::physical_to_locus`] and
/// [`RecombinationMap::locus_to_physical`] are mutual inverses at loci
/// generated under this map; see the crate docs for the caveat about
/// mixing independently constructed maps.
#[derive(Clone, Debug, PartialEq)]
pub struct RecombinationMap {
    positions: Vec<Position>,
    rates: Vec<f64>,
    cumulative: Vec<f64>,
    total_mass: f64,
    num_loci: i64,
}

impl RecombinationMap {
    /// Create a map from interval boundaries and per-base rates.
    ///
    /// `positions` must have one more entry than `rates`, begin at 0,
    /// and strictly increase; the final entry is the sequence length.
    pub fn new(
        positions: Vec<Position>,
        rates: Vec<f64>,
        num_loci: i64,
    ) -> Result<Self, GeneticsError> {
        if positions.len() != rates.len() + 1 || positions.len() < 2 {
            return Err(GeneticsError::InvalidMapPositions);
        }
        if positions[0] != 0 {
            return Err(GeneticsError::InvalidMapPositions);
        }
        for w in positions.windows(2) {
            if w[1] <= w[0] {
                return Err(GeneticsError::InvalidMapPositions);
            }
        }
        for rate in &rates {
            if !rate.is_finite() || *rate < 0.0 {
                return Err(GeneticsError::InvalidRate { found: *rate });
            }
        }
        let mut cumulative = Vec::with_capacity(positions.len());
        let mut total_mass = 0.0;
        cumulative.push(0.0);
        for (i, rate) in rates.iter().enumerate() {
            let span = i64::from(positions[i + 1]) - i64::from(positions[i]);
            total_mass += rate * span as f64;
            cumulative.push(total_mass);
        }
        if num_loci < 1 {
            return Err(GeneticsError::InvalidNumLoci);
        }
        if total_mass <= 0.0 && num_loci != 1 {
            return Err(GeneticsError::InvalidNumLoci);
        }
        Ok(Self {
            positions,
            rates,
            cumulative,
            total_mass,
            num_loci,
        })
    }

    /// A map with a single uniform rate.
    ///
    /// With a positive rate, the locus discretization is one locus per
    /// base, making locus and physical coordinates coincide.  With a
    /// zero rate the whole genome collapses to a single locus.
    pub fn uniform<P>(sequence_length: P, rate: f64) -> Result<Self, GeneticsError>
    where
        P: TryInto<Position>,
    {
        let length = sequence_length
            .try_into()
            .map_err(|_| GeneticsError::InvalidMapPositions)?;
        let num_loci = if rate > 0.0 { i64::from(length) } else { 1 };
        Self::uniform_with_loci(length, rate, num_loci)
    }

    /// A uniform-rate map with an explicit locus discretization.
    pub fn uniform_with_loci<P>(
        sequence_length: P,
        rate: f64,
        num_loci: i64,
    ) -> Result<Self, GeneticsError>
    where
        P: TryInto<Position>,
    {
        let length = sequence_length
            .try_into()
            .map_err(|_| GeneticsError::InvalidMapPositions)?;
        Self::new(
            vec![Position::new_valid(0), length],
            vec![rate],
            num_loci,
        )
    }

    /// The physical genome length covered by the map.
    pub fn sequence_length(&self) -> Position {
        *self.positions.last().unwrap()
    }

    /// The number of discrete loci.
    pub fn num_loci(&self) -> i64 {
        self.num_loci
    }

    /// Total genetic mass: the expected number of crossovers per
    /// genome per generation.
    pub fn total_mass(&self) -> f64 {
        self.total_mass
    }

    /// Event rate carried by each internal locus boundary.
    ///
    /// A lineage whose material spans loci `[a, b)` holds `b - a - 1`
    /// such boundaries.
    pub fn per_locus_rate(&self) -> f64 {
        if self.num_loci <= 1 {
            0.0
        } else {
            self.total_mass / (self.num_loci - 1) as f64
        }
    }

    /// Cumulative genetic mass at a physical position.
    fn mass_at(&self, pos: Position) -> f64 {
        if pos >= self.sequence_length() {
            return self.total_mass;
        }
        let idx = self.positions.partition_point(|p| *p <= pos) - 1;
        let offset = i64::from(pos) - i64::from(self.positions[idx]);
        self.cumulative[idx] + self.rates[idx] * offset as f64
    }

    /// Translate a physical position into the discrete locus system.
    ///
    /// The position snaps to the nearest locus; `0` maps to locus `0`
    /// and the sequence length maps to `num_loci`.
    pub fn physical_to_locus(&self, pos: Position) -> Locus {
        if self.total_mass <= 0.0 {
            return if pos >= self.sequence_length() {
                Locus::new_valid(self.num_loci)
            } else {
                Locus::new_valid(0)
            };
        }
        let scaled = self.mass_at(pos) / self.total_mass * self.num_loci as f64;
        Locus::new_valid(scaled.round() as i64)
    }

    /// Translate a locus back into a physical position.
    ///
    /// Inverse of [`Self::physical_to_locus`] for loci generated under
    /// this map.  Zero-rate intervals carry no mass, so the leftmost
    /// physical position with the target mass is returned.
    pub fn locus_to_physical(&self, locus: Locus) -> Position {
        let locus = i64::from(locus);
        if locus <= 0 {
            return Position::new_valid(0);
        }
        if locus >= self.num_loci {
            return self.sequence_length();
        }
        let target = locus as f64 / self.num_loci as f64 * self.total_mass;
        for i in 0..self.rates.len() {
            if self.cumulative[i + 1] >= target && self.rates[i] > 0.0 {
                let offset = (target - self.cumulative[i]) / self.rates[i];
                return Position::new_valid(i64::from(self.positions[i]) + offset.round() as i64);
            }
        }
        self.sequence_length()
    }

    /// Check whether a sorted, deduplicated set of interior physical
    /// breakpoints survives translation into this map's locus system:
    /// every breakpoint must land strictly inside `(0, num_loci)` and
    /// no two may collapse onto the same locus.
    ///
    /// This is the advance-detectable half of the coarse-map failure
    /// mode; a `true` result does *not* guarantee that translated
    /// coordinates map back to their original physical values.
    pub fn can_represent(&self, breakpoints: &[Position]) -> bool {
        let mut previous: Option<Locus> = None;
        for bp in breakpoints {
            let locus = self.physical_to_locus(*bp);
            if locus <= 0 || locus >= self.num_loci {
                return false;
            }
            if previous == Some(locus) {
                return false;
            }
            previous = Some(locus);
        }
        true
    }
}
