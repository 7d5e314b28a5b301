use crate::input::PortRange;
use gcd::Gcd;
use rand::Rng;
use std::ops::RangeInclusive;

/// Yields every port of a [`PortRange`] exactly once.
///
/// **Serial**: ascending order, `start..=end`.
///
/// **Randomized**: a permutation of the offsets `0..N` built with the
/// additive congruential step `x_{i+1} = (x_i + step) % N`. `step` is chosen
/// so `gcd(step, N) == 1`, which makes the sequence a full-length cycle. The
/// seed `x_0` is uniform in `0..N`.
///
/// For more information: <https://en.wikipedia.org/wiki/Linear_congruential_generator>
#[derive(Debug)]
pub struct RangeIterator {
    order: Order,
}

#[derive(Debug)]
enum Order {
    Serial(RangeInclusive<u16>),
    Random {
        start: u32,
        total: u32,
        first_pick: u32,
        pick: u32,
        step: u32,
        active: bool,
    },
}

impl RangeIterator {
    pub fn new_serial(range: PortRange) -> Self {
        Self {
            order: Order::Serial(range.iter()),
        }
    }

    pub fn new_random(range: PortRange) -> Self {
        let start = u32::from(range.start());
        let total = u32::from(range.end()) - start + 1;
        let step = pick_random_coprime(total);
        let first = rand::rng().random_range(0..total);

        Self {
            order: Order::Random {
                start,
                total,
                first_pick: first,
                pick: first,
                step,
                active: true,
            },
        }
    }
}

impl Iterator for RangeIterator {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.order {
            Order::Serial(ports) => ports.next(),
            Order::Random {
                start,
                total,
                first_pick,
                pick,
                step,
                active,
            } => {
                if !*active {
                    return None;
                }

                let cur = *pick;
                let next = (cur + *step) % *total;
                // back at the seed: the cycle is complete once `cur` is returned
                if next == *first_pick {
                    *active = false;
                }
                *pick = next;

                u16::try_from(*start + cur).ok()
            }
        }
    }
}

/// The probability that two random integers are coprime to one another
/// works out to be around 61%, given that we can safely pick a random
/// number and test it. Just in case we are having a bad day and we cannot
/// pick a coprime number after 10 tries we just return "end - 1" which
/// is guaranteed to be a coprime, but won't provide ideal randomization.
///
/// We pick between "lower_range" and "upper_range" since values too close to
/// the boundaries would also provide non-ideal randomization.
fn pick_random_coprime(end: u32) -> u32 {
    // ranges of one or two ports have no interesting permutation
    if end <= 2 {
        return 1;
    }

    let range_boundary = end / 4;
    let lower_range = range_boundary.max(1);
    let upper_range = (end - range_boundary).max(lower_range + 1);
    let mut rng = rand::rng();

    for _ in 0..10 {
        let candidate = rng.random_range(lower_range..upper_range);
        if end.gcd(candidate) == 1 {
            return candidate;
        }
    }

    end - 1
}
