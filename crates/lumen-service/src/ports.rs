//! Candidate ports for the retrieval service.

use rand::Rng;

/// Lowest port ever offered to the service.
pub const MIN_PORT: u16 = 10_000;
/// Highest port ever offered to the service.
pub const MAX_PORT: u16 = 60_000;

const SEED_MAX: u16 = 50_000;
const MAX_RETRY_OFFSET: u16 = 10_000;

/// First candidate port of a session, uniformly in `10000..=50000`.
pub fn seed_port<R: Rng + ?Sized>(rng: &mut R) -> u16 {
    rng.random_range(MIN_PORT..=SEED_MAX)
}

/// Next candidate after a port conflict: `port` plus a random offset in
/// `1..=10000`, wrapped back into `10000..=60000`.
///
/// # Examples
///
/// ```
/// use lumen_service::ports::{next_port, MAX_PORT, MIN_PORT};
///
/// let mut rng = rand::rng();
/// let port = next_port(59_999, &mut rng);
/// assert!((MIN_PORT..=MAX_PORT).contains(&port));
/// assert_ne!(port, 59_999);
/// ```
pub fn next_port<R: Rng + ?Sized>(port: u16, rng: &mut R) -> u16 {
    let offset = rng.random_range(1..=MAX_RETRY_OFFSET);
    wrap(u32::from(port) + u32::from(offset))
}

fn wrap(candidate: u32) -> u16 {
    let min = u32::from(MIN_PORT);
    let span = u32::from(MAX_PORT) - min + 1;
    let wrapped = if candidate < min {
        min
    } else {
        min + (candidate - min) % span
    };
    // `wrapped` is at most MAX_PORT.
    wrapped as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_in_range() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let port = seed_port(&mut rng);
            assert!((MIN_PORT..=SEED_MAX).contains(&port));
        }
    }

    #[test]
    fn next_port_moves_forward_or_wraps() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let port = next_port(20_000, &mut rng);
            assert!((20_001..=30_000).contains(&port));
        }
    }

    #[test]
    fn wrap_stays_in_window() {
        assert_eq!(wrap(60_000), 60_000);
        assert_eq!(wrap(60_001), 10_000);
        assert_eq!(wrap(70_000), 19_999);
        assert_eq!(wrap(5), MIN_PORT);
    }
}
