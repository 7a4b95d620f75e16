//! Append-only voting-weight histories.
//!
//! A series is an ordered run of [`Checkpoint`]s, strictly increasing in
//! `from_block`, each holding the running total valid from that block on.
//! Storage backends implement [`CheckpointSeries`]; the lookup and append
//! logic here is shared by the per-account and the total-supply series.

use frame_support::pallet_prelude::*;
use sp_core::U256;
use sp_runtime::traits::IntegerSquareRoot;

/// Series longer than this are probed near their tail before bisecting.
const RECENT_PROBE_THRESHOLD: u32 = 5;

/// Voting weight of a series from `from_block` until the next checkpoint.
#[derive(
    Clone, Copy, Encode, Decode, MaxEncodedLen, TypeInfo, PartialEq, Eq, RuntimeDebug, Default,
)]
pub struct Checkpoint<BlockNumber> {
    pub from_block: BlockNumber,
    pub votes: U256,
}

#[derive(Clone, Copy, PartialEq, Eq, RuntimeDebug)]
pub enum CheckpointError {
    /// The write targets a block before the last checkpoint.
    OutOfOrder,
}

/// Positional access to one checkpoint series.
pub trait CheckpointSeries<BlockNumber> {
    fn len(&self) -> u32;

    fn at(&self, pos: u32) -> Option<Checkpoint<BlockNumber>>;

    /// Writes `checkpoint` at `pos`, which is either the last slot or `len()`.
    fn write(&mut self, pos: u32, checkpoint: Checkpoint<BlockNumber>);

    fn set_len(&mut self, len: u32);
}

/// Most recent value of the series, zero when empty.
pub fn latest<B, S: CheckpointSeries<B>>(series: &S) -> U256 {
    match series.len() {
        0 => U256::zero(),
        len => series.at(len - 1).map(|c| c.votes).unwrap_or_default(),
    }
}

/// Value of the last checkpoint with `from_block <= block`, zero if there is none.
///
/// Lookups mostly target recent blocks, so long series first probe the
/// position `len - sqrt(len)` to narrow the range.
pub fn upper_lookup_recent<B, S>(series: &S, block: B) -> U256
where
    B: PartialOrd + Copy,
    S: CheckpointSeries<B>,
{
    let len = series.len();
    let mut low = 0u32;
    let mut high = len;

    if len > RECENT_PROBE_THRESHOLD {
        let mid = len - len.integer_sqrt();
        match series.at(mid) {
            Some(probe) if block < probe.from_block => high = mid,
            _ => low = mid + 1,
        }
    }

    let pos = upper_binary_lookup(series, block, low, high);
    if pos == 0 {
        return U256::zero();
    }
    series.at(pos - 1).map(|c| c.votes).unwrap_or_default()
}

/// First index in `[low, high)` whose checkpoint starts after `block`, or `high`.
fn upper_binary_lookup<B, S>(series: &S, block: B, mut low: u32, mut high: u32) -> u32
where
    B: PartialOrd + Copy,
    S: CheckpointSeries<B>,
{
    while low < high {
        let mid = low + (high - low) / 2;
        match series.at(mid) {
            Some(c) if c.from_block > block => high = mid,
            _ => low = mid + 1,
        }
    }
    high
}

/// Records `votes` as the value of the series from `block` on.
///
/// Overwrites the last checkpoint when it already sits at `block`, otherwise
/// appends. Returns the previous and the new value.
pub fn push<B, S>(series: &mut S, block: B, votes: U256) -> Result<(U256, U256), CheckpointError>
where
    B: PartialOrd + Copy,
    S: CheckpointSeries<B>,
{
    let len = series.len();
    if let Some(last) = len.checked_sub(1).and_then(|pos| series.at(pos)) {
        if last.from_block > block {
            return Err(CheckpointError::OutOfOrder);
        }
        if last.from_block == block {
            series.write(len - 1, Checkpoint { from_block: block, votes });
            return Ok((last.votes, votes));
        }
        series.write(len, Checkpoint { from_block: block, votes });
        series.set_len(len + 1);
        return Ok((last.votes, votes));
    }

    series.write(0, Checkpoint { from_block: block, votes });
    series.set_len(1);
    Ok((U256::zero(), votes))
}

#[cfg(test)]
impl<B: Copy> CheckpointSeries<B> for sp_std::vec::Vec<Checkpoint<B>> {
    fn len(&self) -> u32 {
        <[Checkpoint<B>]>::len(self) as u32
    }

    fn at(&self, pos: u32) -> Option<Checkpoint<B>> {
        self.get(pos as usize).copied()
    }

    fn write(&mut self, pos: u32, checkpoint: Checkpoint<B>) {
        match self.get_mut(pos as usize) {
            Some(slot) => *slot = checkpoint,
            None => self.push(checkpoint),
        }
    }

    fn set_len(&mut self, len: u32) {
        self.truncate(len as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn series(points: &[(u64, u64)]) -> Vec<Checkpoint<u64>> {
        let mut s: Vec<Checkpoint<u64>> = Vec::new();
        for &(block, votes) in points {
            push(&mut s, block, U256::from(votes)).unwrap();
        }
        s
    }

    fn linear_lookup(s: &[Checkpoint<u64>], block: u64) -> U256 {
        s.iter().rev().find(|c| c.from_block <= block).map(|c| c.votes).unwrap_or_default()
    }

    #[test]
    fn empty_series_reads_zero() {
        let s: Vec<Checkpoint<u64>> = Vec::new();
        assert_eq!(latest(&s), U256::zero());
        assert_eq!(upper_lookup_recent(&s, 100), U256::zero());
    }

    #[test]
    fn push_at_same_block_overwrites() {
        let mut s = series(&[(3, 10)]);
        assert_eq!(push(&mut s, 3, U256::from(25)), Ok((U256::from(10), U256::from(25))));
        assert_eq!(s.len(), 1);
        assert_eq!(latest(&s), U256::from(25));
    }

    #[test]
    fn push_at_later_block_appends() {
        let mut s = series(&[(3, 10)]);
        assert_eq!(push(&mut s, 4, U256::from(7)), Ok((U256::from(10), U256::from(7))));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn push_before_last_block_is_rejected() {
        let mut s = series(&[(3, 10), (8, 12)]);
        assert_eq!(push(&mut s, 5, U256::from(1)), Err(CheckpointError::OutOfOrder));
        assert_eq!(s, series(&[(3, 10), (8, 12)]));
    }

    #[test]
    fn lookup_before_first_checkpoint_is_zero() {
        let s = series(&[(5, 10), (9, 20)]);
        assert_eq!(upper_lookup_recent(&s, 4), U256::zero());
        assert_eq!(upper_lookup_recent(&s, 5), U256::from(10));
        assert_eq!(upper_lookup_recent(&s, 8), U256::from(10));
        assert_eq!(upper_lookup_recent(&s, 9), U256::from(20));
        assert_eq!(upper_lookup_recent(&s, 1_000), U256::from(20));
    }

    #[test]
    fn lookup_uses_recent_probe_on_long_series() {
        let points: Vec<(u64, u64)> = (1..=40).map(|b| (b * 2, b * 100)).collect();
        let s = series(&points);
        assert_eq!(upper_lookup_recent(&s, 1), U256::zero());
        assert_eq!(upper_lookup_recent(&s, 3), U256::from(100));
        assert_eq!(upper_lookup_recent(&s, 79), U256::from(3_900));
        assert_eq!(upper_lookup_recent(&s, 80), U256::from(4_000));
    }

    proptest! {
        #[test]
        fn binary_lookup_matches_linear_scan(
            gaps in prop::collection::vec((1u64..5, 0u64..1_000_000), 0..64),
            probes in prop::collection::vec(0u64..400, 1..32),
        ) {
            let mut block = 0u64;
            let mut s: Vec<Checkpoint<u64>> = Vec::new();
            for (gap, votes) in gaps {
                block += gap;
                push(&mut s, block, U256::from(votes)).unwrap();
            }
            for probe in probes {
                prop_assert_eq!(upper_lookup_recent(&s, probe), linear_lookup(&s, probe));
            }
        }
    }
}
