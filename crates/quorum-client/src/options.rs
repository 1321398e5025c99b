//! Options for quorum operations.
//!
//! Both builders take setters in any order and validate once, in `build()`,
//! before anything touches the network.

use quorum_core::Algorithm;
use quorum_core::payload::{KeyGenerationRequest, SignatureRequest};

/// An operation's options cannot satisfy its quorum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(
        "{algorithm} at threshold {threshold} needs at least {required} nodes, {supplied} supplied"
    )]
    InsufficientNodes {
        algorithm: Algorithm,
        threshold: usize,
        required: usize,
        supplied: usize,
    },
    #[error("threshold {0} is too large")]
    ThresholdTooLarge(usize),
}

/// Check `supplied` nodes against `required`, and narrow the threshold to its
/// wire width. An unset threshold travels as 0.
fn check_quorum(
    algorithm: Algorithm,
    threshold: Option<usize>,
    required: usize,
    supplied: usize,
) -> Result<u32, ValidationError> {
    let Some(threshold) = threshold else {
        return Ok(0);
    };
    let wire = u32::try_from(threshold).map_err(|_| ValidationError::ThresholdTooLarge(threshold))?;
    if supplied < required {
        return Err(ValidationError::InsufficientNodes {
            algorithm,
            threshold,
            required,
            supplied,
        });
    }
    Ok(wire)
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Validated options for a threshold signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureGenerationOptions {
    algorithm: Algorithm,
    parameters: Vec<String>,
    threshold: Option<usize>,
    wire_threshold: u32,
    nodes: Vec<String>,
}

impl SignatureGenerationOptions {
    pub fn builder(algorithm: Algorithm) -> SignatureGenerationOptionsBuilder {
        SignatureGenerationOptionsBuilder {
            algorithm,
            parameters: Vec::new(),
            threshold: None,
            nodes: Vec::new(),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Threshold the key was generated at, if one was given.
    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    /// Names of the nodes asked to take part.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn request(&self, key_id: impl Into<String>, message: impl Into<Vec<u8>>) -> SignatureRequest {
        SignatureRequest {
            key_id: key_id.into(),
            algorithm: self.algorithm,
            parameters: self.parameters.clone(),
            threshold: self.wire_threshold,
            nodes: self.nodes.clone(),
            message: message.into(),
        }
    }
}

/// Builder for [`SignatureGenerationOptions`].
#[derive(Debug, Clone)]
pub struct SignatureGenerationOptionsBuilder {
    algorithm: Algorithm,
    parameters: Vec<String>,
    threshold: Option<usize>,
    nodes: Vec<String>,
}

impl SignatureGenerationOptionsBuilder {
    pub fn parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = strings(parameters);
        self
    }

    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Nodes to take part. Algorithms needing secret multiplication (ECDSA)
    /// need twice the threshold.
    pub fn nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = strings(nodes);
        self
    }

    pub fn build(self) -> Result<SignatureGenerationOptions, ValidationError> {
        let required = self.threshold.map_or(0, |t| self.algorithm.min_nodes(t));
        let wire_threshold =
            check_quorum(self.algorithm, self.threshold, required, self.nodes.len())?;
        Ok(SignatureGenerationOptions {
            algorithm: self.algorithm,
            parameters: self.parameters,
            threshold: self.threshold,
            wire_threshold,
            nodes: self.nodes,
        })
    }
}

/// Validated options for distributed key generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGenerationOptions {
    algorithm: Algorithm,
    parameters: Vec<String>,
    threshold: Option<usize>,
    wire_threshold: u32,
    nodes: Vec<String>,
}

impl KeyGenerationOptions {
    pub fn builder(algorithm: Algorithm) -> KeyGenerationOptionsBuilder {
        KeyGenerationOptionsBuilder {
            algorithm,
            parameters: Vec::new(),
            threshold: None,
            nodes: Vec::new(),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn request(&self, key_id: impl Into<String>) -> KeyGenerationRequest {
        KeyGenerationRequest {
            key_id: key_id.into(),
            algorithm: self.algorithm,
            parameters: self.parameters.clone(),
            threshold: self.wire_threshold,
            nodes: self.nodes.clone(),
        }
    }
}

/// Builder for [`KeyGenerationOptions`].
#[derive(Debug, Clone)]
pub struct KeyGenerationOptionsBuilder {
    algorithm: Algorithm,
    parameters: Vec<String>,
    threshold: Option<usize>,
    nodes: Vec<String>,
}

impl KeyGenerationOptionsBuilder {
    pub fn parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = strings(parameters);
        self
    }

    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = strings(nodes);
        self
    }

    /// Every share holder must take part in generation, so the node list
    /// must cover the threshold for any algorithm.
    pub fn build(self) -> Result<KeyGenerationOptions, ValidationError> {
        let required = self.threshold.unwrap_or(0);
        let wire_threshold =
            check_quorum(self.algorithm, self.threshold, required, self.nodes.len())?;
        Ok(KeyGenerationOptions {
            algorithm: self.algorithm,
            parameters: self.parameters,
            threshold: self.threshold,
            wire_threshold,
            nodes: self.nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("node{i}")).collect()
    }

    #[test]
    fn ecdsa_needs_twice_the_threshold() {
        let err = SignatureGenerationOptions::builder(Algorithm::Ecdsa)
            .threshold(3)
            .nodes(names(5))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InsufficientNodes {
                algorithm: Algorithm::Ecdsa,
                threshold: 3,
                required: 6,
                supplied: 5,
            }
        );

        let options = SignatureGenerationOptions::builder(Algorithm::Ecdsa)
            .threshold(3)
            .nodes(names(6))
            .build()
            .unwrap();
        assert_eq!(options.nodes().len(), 6);
        assert_eq!(options.threshold(), Some(3));
    }

    #[test]
    fn other_algorithms_need_the_threshold() {
        for alg in [Algorithm::Bls, Algorithm::EcElGamal] {
            assert!(
                SignatureGenerationOptions::builder(alg)
                    .threshold(3)
                    .nodes(names(2))
                    .build()
                    .is_err()
            );
            assert!(
                SignatureGenerationOptions::builder(alg)
                    .threshold(3)
                    .nodes(names(3))
                    .build()
                    .is_ok()
            );
        }
    }

    #[test]
    fn setter_order_does_not_matter() {
        let nodes_first = SignatureGenerationOptions::builder(Algorithm::Ecdsa)
            .nodes(names(4))
            .threshold(2)
            .parameters(["secp256r1"])
            .build()
            .unwrap();
        let threshold_first = SignatureGenerationOptions::builder(Algorithm::Ecdsa)
            .parameters(["secp256r1"])
            .threshold(2)
            .nodes(names(4))
            .build()
            .unwrap();
        assert_eq!(nodes_first, threshold_first);

        assert!(
            SignatureGenerationOptions::builder(Algorithm::Ecdsa)
                .nodes(names(3))
                .threshold(2)
                .build()
                .is_err()
        );
    }

    #[test]
    fn unset_threshold_is_unconstrained() {
        let options = SignatureGenerationOptions::builder(Algorithm::Ecdsa)
            .build()
            .unwrap();
        assert_eq!(options.threshold(), None);
        assert!(options.nodes().is_empty());
        assert_eq!(options.request("k", b"m".to_vec()).threshold, 0);
    }

    #[test]
    fn oversized_threshold_is_rejected() {
        let huge = usize::try_from(u64::from(u32::MAX) + 1);
        if let Ok(huge) = huge {
            let err = KeyGenerationOptions::builder(Algorithm::Bls)
                .threshold(huge)
                .build()
                .unwrap_err();
            assert_eq!(err, ValidationError::ThresholdTooLarge(huge));
        }
    }

    #[test]
    fn key_generation_has_no_multiplier() {
        assert!(
            KeyGenerationOptions::builder(Algorithm::Ecdsa)
                .threshold(3)
                .nodes(names(3))
                .build()
                .is_ok()
        );
        assert!(
            KeyGenerationOptions::builder(Algorithm::Ecdsa)
                .threshold(3)
                .nodes(names(2))
                .build()
                .is_err()
        );
    }

    #[test]
    fn requests_carry_the_options() {
        let options = KeyGenerationOptions::builder(Algorithm::Bls)
            .parameters(["bn256"])
            .threshold(2)
            .nodes(["a", "b", "c"])
            .build()
            .unwrap();
        let request = options.request("election-key");
        assert_eq!(request.key_id, "election-key");
        assert_eq!(request.algorithm, Algorithm::Bls);
        assert_eq!(request.parameters, vec!["bn256".to_string()]);
        assert_eq!(request.threshold, 2);
        assert_eq!(request.nodes, vec!["a", "b", "c"]);
    }

    #[test]
    fn validation_message_names_the_shortfall() {
        let err = SignatureGenerationOptions::builder(Algorithm::Ecdsa)
            .threshold(3)
            .nodes(names(5))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ecdsa at threshold 3 needs at least 6 nodes, 5 supplied"
        );
    }
}
