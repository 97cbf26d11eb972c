//! Instructions, transactions, and canonical encodings
//!
//! An [`Instruction`] describes one state change against a ledger
//! instance: spawn a new instance under a contract, or invoke a contract
//! command on an existing one. A [`Transaction`] is an ordered list of
//! instructions signed as a unit; this system only ever builds
//! single-instruction transactions.
//!
//! The canonical byte encoding of an instruction (length-prefixed field
//! concatenation, see [`Instruction::digest`]) is what signers sign and
//! what derived instance ids are computed from. It deliberately excludes
//! the signer and signature fields so the digest is stable across signing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{Error, Result};
use crate::hash::{Digest32, Hasher};
use crate::identity::{Identity, Signature, Signer};

/// Identifier of a ledger instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub [u8; 32]);

impl InstanceId {
    /// The well-known singleton instance of the naming contract
    pub const NAMING: InstanceId = InstanceId([0xff; 32]);

    /// The raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from raw bytes, validating length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::validation(format!("instance id must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Named binary argument to a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name, fixed per contract command
    pub name: String,
    /// Raw argument value
    pub value: Vec<u8>,
}

impl Argument {
    /// Raw-bytes argument
    pub fn bytes(name: &str, value: Vec<u8>) -> Self {
        Self { name: name.to_string(), value }
    }

    /// 8-byte little-endian unsigned integer argument (block heights)
    pub fn u64(name: &str, value: u64) -> Self {
        Self { name: name.to_string(), value: value.to_le_bytes().to_vec() }
    }

    /// 4-byte little-endian unsigned integer argument (instruction index)
    pub fn u32(name: &str, value: u32) -> Self {
        Self { name: name.to_string(), value: value.to_le_bytes().to_vec() }
    }
}

/// What an instruction does to its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a new instance under `contract`; the new id is derived from
    /// the spawning instruction
    Spawn {
        /// Contract id responsible for the new instance
        contract: String,
        /// Spawn arguments
        args: Vec<Argument>,
    },
    /// Invoke `command` of `contract` on the target instance
    Invoke {
        /// Contract id of the target instance
        contract: String,
        /// Contract command
        command: String,
        /// Invocation arguments
        args: Vec<Argument>,
    },
}

impl Operation {
    /// The operation's arguments
    pub fn args(&self) -> &[Argument] {
        match self {
            Self::Spawn { args, .. } | Self::Invoke { args, .. } => args,
        }
    }

    /// Look up an argument by name
    pub fn arg(&self, name: &str) -> Option<&[u8]> {
        self.args().iter().find(|a| a.name == name).map(|a| a.value.as_slice())
    }
}

/// One state change against a ledger instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The instance acted on (for spawns, the governing charter instance)
    pub target: InstanceId,
    /// What to do
    pub operation: Operation,
    /// Replay counter per signer, parallel to `signers`
    pub signer_counters: Vec<u64>,
    /// Identities that signed this instruction, filled by signing
    pub signers: Vec<Identity>,
    /// Detached signatures over [`Instruction::digest`], parallel to `signers`
    pub signatures: Vec<Signature>,
}

impl Instruction {
    /// Spawn instruction
    pub fn spawn(target: InstanceId, contract: &str, args: Vec<Argument>) -> Self {
        Self {
            target,
            operation: Operation::Spawn { contract: contract.to_string(), args },
            signer_counters: Vec::new(),
            signers: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Invoke instruction
    pub fn invoke(target: InstanceId, contract: &str, command: &str, args: Vec<Argument>) -> Self {
        Self {
            target,
            operation: Operation::Invoke {
                contract: contract.to_string(),
                command: command.to_string(),
                args,
            },
            signer_counters: Vec::new(),
            signers: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Set the single signer's replay counter
    pub fn with_counter(mut self, counter: u64) -> Self {
        self.signer_counters = vec![counter];
        self
    }

    /// Canonical content digest: target, operation shape, arguments, and
    /// counters, each as a length-prefixed field. Signers and signatures
    /// are excluded so the digest is what they sign.
    pub fn digest(&self) -> Digest32 {
        let mut h = Hasher::new();
        h.field(self.target.as_bytes());
        match &self.operation {
            Operation::Spawn { contract, args } => {
                h.field(b"spawn");
                h.field(contract.as_bytes());
                for arg in args {
                    h.field(arg.name.as_bytes());
                    h.field(&arg.value);
                }
            }
            Operation::Invoke { contract, command, args } => {
                h.field(b"invoke");
                h.field(contract.as_bytes());
                h.field(command.as_bytes());
                for arg in args {
                    h.field(arg.name.as_bytes());
                    h.field(&arg.value);
                }
            }
        }
        for counter in &self.signer_counters {
            h.field(&counter.to_le_bytes());
        }
        h.finalize()
    }

    /// Instance id a spawn derives: stable across re-fetches because it
    /// only depends on the instruction content
    pub fn derive_instance_id(&self) -> InstanceId {
        let mut h = Hasher::new();
        h.field(b"derived");
        h.field(&self.digest());
        InstanceId(h.finalize())
    }
}

/// Ordered list of instructions signed and committed as a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The instructions, applied in order
    pub instructions: Vec<Instruction>,
}

impl Transaction {
    /// The single-instruction transaction this system always builds
    pub fn single(instruction: Instruction) -> Self {
        Self { instructions: vec![instruction] }
    }

    /// Per-instruction content digests
    pub fn digests(&self) -> Vec<Digest32> {
        self.instructions.iter().map(Instruction::digest).collect()
    }

    /// Fill every instruction's signer and signature from `signer`
    pub fn sign_with(&mut self, signer: &Signer) {
        for instruction in &mut self.instructions {
            let digest = instruction.digest();
            instruction.signers = vec![signer.identity()];
            instruction.signatures = vec![signer.sign(&digest)];
        }
    }

    /// Canonical binary encoding at the ledger boundary
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::encoding(format!("transaction: {e}")))
    }

    /// Decode the canonical binary encoding
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::encoding(format!("transaction: {e}")))
    }
}
