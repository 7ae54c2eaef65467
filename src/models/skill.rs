use serde::{Deserialize, Serialize};

/// Every skill the engine knows about. Adding a skill means adding a variant here and a row in
/// [`SkillKind::data`]; behaviour lives in `services::skills::apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillKind {
    Hide,
    Search,
}

pub struct SkillData {
    pub name: &'static str,
    pub description: &'static str,
    pub cooldown_seconds: f64,
    pub needs_target: bool,
}

const HIDE: SkillData = SkillData {
    name: "hide",
    description: "Disappear from the sight of others in the area",
    cooldown_seconds: 2.0,
    needs_target: false,
};

const SEARCH: SkillData = SkillData {
    name: "search",
    description: "Look for a hidden player in the area",
    cooldown_seconds: 3.0,
    needs_target: true,
};

impl SkillKind {
    pub fn all() -> &'static [SkillKind] {
        &[SkillKind::Hide, SkillKind::Search]
    }

    pub fn data(&self) -> &'static SkillData {
        match self {
            SkillKind::Hide => &HIDE,
            SkillKind::Search => &SEARCH,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.data().name
    }
}

/// A character's copy of a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInstance {
    pub kind: SkillKind,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub uses: u64,
}

fn default_level() -> u32 {
    1
}

impl SkillInstance {
    pub fn new(kind: SkillKind) -> Self {
        Self { kind, level: 1, uses: 0 }
    }

    /// The starting set every new character receives.
    pub fn starting_set() -> Vec<SkillInstance> {
        SkillKind::all().iter().copied().map(SkillInstance::new).collect()
    }
}
