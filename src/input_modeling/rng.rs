use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// The random number generator used in simulations is a permuted
/// congruential generator with 128-bit state, internal multiplicative
/// congruential generator, and 64-bit output via "xorshift low (bits),
/// random rotation" output function.  This random number generator is
/// seedable and portable across platforms.
pub type SimulationRng = Pcg64Mcg;

/// Build the simulation generator from an optional seed.  A seeded
/// generator makes runs repeatable; without a seed the generator is seeded
/// from operating system entropy.
pub fn seeded(seed: Option<u64>) -> SimulationRng {
    match seed {
        Some(seed) => Pcg64Mcg::seed_from_u64(seed),
        None => Pcg64Mcg::from_entropy(),
    }
}
