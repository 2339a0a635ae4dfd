//! Client-side push keys.
//!
//! 20 characters: 8 encode the millisecond timestamp, 12 are random. Keys
//! generated in the same millisecond increment the random part so they still
//! sort in generation order. When the random part is exhausted, or the clock
//! steps back, the key borrows the next millisecond instead.

use std::sync::{Arc, Mutex, PoisonError};

use bridge_traits::Clock;
use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Debug, Default)]
struct PushIdState {
    last_millis: i64,
    last_random: [u8; RANDOM_CHARS],
}

pub struct PushIdGenerator {
    clock: Arc<dyn Clock>,
    state: Mutex<PushIdState>,
}

impl PushIdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(PushIdState::default()),
        }
    }

    pub fn generate(&self) -> String {
        let now = self.clock.unix_timestamp_millis().max(0);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let millis = if now > state.last_millis {
            let mut rng = rand::thread_rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
            now
        } else if increment(&mut state.last_random) {
            state.last_millis
        } else {
            state.last_millis + 1
        };
        state.last_millis = millis;

        let mut id = [0u8; TIME_CHARS + RANDOM_CHARS];
        let mut remaining = millis;
        for slot in id[..TIME_CHARS].iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }
        for (slot, index) in id[TIME_CHARS..].iter_mut().zip(state.last_random.iter()) {
            *slot = PUSH_CHARS[*index as usize];
        }

        id.iter().map(|&byte| byte as char).collect()
    }
}

/// Base-64 increment with carry. False when every digit was maxed and the
/// value wrapped to zero.
fn increment(digits: &mut [u8; RANDOM_CHARS]) -> bool {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return true;
        }
    }
    false
}
