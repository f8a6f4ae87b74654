use chaindefs_codec::{deserialize, PayloadHeader};
use chaindefs_crypto::{cosi, AuthorizedKeys, CosiSignature, MerkleProof};
use chaindefs_types::{Definition, Digest};

use crate::error::{PackError, PackResult};

/// One record's payload, inclusion proof, and batch signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub payload: Vec<u8>,
    pub proof: MerkleProof,
    pub signature: CosiSignature,
}

impl Artifact {
    pub fn new(payload: Vec<u8>, proof: MerkleProof, signature: CosiSignature) -> Self {
        Self {
            payload,
            proof,
            signature,
        }
    }

    /// `payload || encoded proof || signature`.
    pub fn to_bytes(&self) -> PackResult<Vec<u8>> {
        let proof = self.proof.encode()?;
        let mut out =
            Vec::with_capacity(self.payload.len() + proof.len() + CosiSignature::LEN);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&proof);
        out.extend_from_slice(&self.signature.to_bytes());
        Ok(out)
    }

    /// Split an artifact into its three parts. The payload length comes from
    /// its header; the signature must exactly fill the remainder.
    pub fn parse(data: &[u8]) -> PackResult<Self> {
        let payload_len = PayloadHeader::parse(data)?.payload_len();
        if data.len() < payload_len {
            return Err(PackError::Malformed(format!(
                "payload needs {payload_len} bytes, artifact has {}",
                data.len()
            )));
        }
        let (payload, rest) = data.split_at(payload_len);
        let (proof, used) = MerkleProof::decode(rest)?;
        let signature = CosiSignature::from_bytes(&rest[used..])?;
        Ok(Self {
            payload: payload.to_vec(),
            proof,
            signature,
        })
    }

    /// Root committed by the payload and proof.
    pub fn root(&self) -> Digest {
        self.proof.compute_root(&self.payload)
    }

    /// Recompute the root and check the signature over it. Returns the root.
    pub fn verify(&self, authorized: &AuthorizedKeys) -> PackResult<Digest> {
        let root = self.root();
        cosi::verify(&self.signature, root.as_bytes(), authorized)?;
        Ok(root)
    }

    /// Decode the record carried by the payload.
    pub fn definition(&self) -> PackResult<Definition> {
        Ok(deserialize(&self.payload)?.1)
    }
}
