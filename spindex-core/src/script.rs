use bitcoin::Script;

/// Output script kinds that can contribute a key to a silent payment tweak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    P2tr,
    P2wpkh,
    P2sh,
    P2pkh,
    Other,
}

impl ScriptKind {
    pub fn classify(script: &Script) -> Self {
        if script.is_p2tr() {
            ScriptKind::P2tr
        } else if script.is_p2wpkh() {
            ScriptKind::P2wpkh
        } else if script.is_p2sh() {
            ScriptKind::P2sh
        } else if script.is_p2pkh() {
            ScriptKind::P2pkh
        } else {
            ScriptKind::Other
        }
    }
}
