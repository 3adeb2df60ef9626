//! Messages exchanged with the debug target.

use serde::{Deserialize, Serialize};

/// x86 register snapshot. Missing fields decode as zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registers {
    pub eip: u32,
    pub esp: u32,
    pub ebp: u32,
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub eflags: u32,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
    pub ss: u16,
}

impl Registers {
    /// `(name, value)` pairs in display order.
    pub fn named(&self) -> [(&'static str, u32); 16] {
        [
            ("eip", self.eip),
            ("esp", self.esp),
            ("ebp", self.ebp),
            ("eax", self.eax),
            ("ebx", self.ebx),
            ("ecx", self.ecx),
            ("edx", self.edx),
            ("esi", self.esi),
            ("edi", self.edi),
            ("eflags", self.eflags),
            ("cs", self.cs.into()),
            ("ds", self.ds.into()),
            ("es", self.es.into()),
            ("fs", self.fs.into()),
            ("gs", self.gs.into()),
            ("ss", self.ss.into()),
        ]
    }
}

/// Sent by the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TargetEvent {
    Running { running: bool },
    Registers { registers: Registers },
    /// A module was loaded (or reloaded) at `base`.
    Module { base: u64, name: String },
    /// Console traffic from the target's debugger prompt.
    Output { text: String },
}

/// Sent to the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TargetCommand {
    Break,
    Step,
    Next,
    Continue,
    /// Raw command line typed at the console.
    Interactive { text: String },
}
