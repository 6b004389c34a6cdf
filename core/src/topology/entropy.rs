//! Information-theoretic uncertainty of the link model
//!
//! Each link is a Bernoulli variable; its uncertainty is the binary Shannon
//! entropy of its probability. The topology-wide figure is the mean over all
//! links, and topology confidence is its complement.

/// Binary Shannon entropy in bits. `H(0) = H(1) = 0`, peak of 1.0 at `p = 0.5`.
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    let h = -(p * p.log2() + (1.0 - p) * (1.0 - p).log2());
    h.min(1.0)
}

/// Mean binary entropy over a set of link probabilities.
///
/// An empty set has zero uncertainty by convention: there is nothing the model
/// claims to know, so nothing it can be unsure about.
pub fn mean_entropy<I>(probabilities: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut total = 0.0;
    let mut count = 0usize;
    for p in probabilities {
        total += binary_entropy(p);
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Topology confidence derived from mean entropy
pub fn confidence_from_entropy(entropy: f64) -> f64 {
    (1.0 - entropy).clamp(0.0, 1.0)
}
