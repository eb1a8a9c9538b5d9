//! Engine-wide knobs. Defaults reproduce the values the original plugin
//! hard-coded rather than reading from environment, since this crate has
//! no environment of its own — a host wires `EngineConfig` up however it
//! wires up its own configuration.

/// The Type-A pairing parameter string (q, h, r, exp2, exp1, sign1, sign0),
/// reproduced bit for bit. `GlobalSetup` only ever overrides this in tests.
pub const DEFAULT_PAIRING_PARAMS: &str = "type a\n\
q 8780710799663312522437781984754049815806883199414208211028653399266475630880222957078625179422662221423155858769582317459277713367317481324925129998224791\n\
h 12016012264891146079388821366740534204802954401251311822919615131047207289359704531102844802183906537786776\n\
r 730750818665451621361119245571504901405976559617\n\
exp2 159\n\
exp1 107\n\
sign1 1\n\
sign0 1\n";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Override for the pairing parameter string. `None` uses
    /// [`DEFAULT_PAIRING_PARAMS`].
    pub pairing_params: Option<String>,
    /// AES key size in bits. The DEM is fixed at AES-256-CBC; this field
    /// exists so the choice is visible in one place rather than scattered
    /// across `crypto::aes`.
    pub aes_key_bits: u32,
    /// Whether `auth_setup` / `keygen` calls serialize through an internal
    /// mutex. When `false` the caller is asserting single-writer usage and
    /// accepts the original plugin's behavior of racing dual writes.
    pub serialize_writes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pairing_params: None,
            aes_key_bits: 256,
            serialize_writes: true,
        }
    }
}

impl EngineConfig {
    pub fn pairing_params(&self) -> &str {
        self.pairing_params.as_deref().unwrap_or(DEFAULT_PAIRING_PARAMS)
    }
}
