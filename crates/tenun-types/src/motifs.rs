use serde::Serialize;

/// Cultural background for one classifiable weaving motif.
#[derive(Debug, Serialize)]
pub struct MotifAnalysis {
    pub title: &'static str,
    pub description: &'static str,
    pub symbolism: &'static [&'static str],
    pub cultural_context: &'static str,
    pub usage_occasions: &'static [&'static str],
}

pub static AYAM: MotifAnalysis = MotifAnalysis {
    title: "Chicken Motif in Sumba Weaving",
    description: "The chicken (ayam) motif stands for fertility, new life and the bond \
        between the living and their ancestors. Chickens are offered in Sumba ceremonies \
        as a means of spiritual communication, and the rooster's morning call is read as \
        a sign of hope and watchfulness. The motif can also mark clan identity and social \
        standing passed down through families.",
    symbolism: &[
        "Fertility and new life",
        "Spiritual connection with ancestors",
        "Medium of communication in ceremonies",
        "Hope and protection",
        "Clan identity and inherited status",
    ],
    cultural_context: "Chickens are central to Marapu rituals, where they are offered to \
        the ancestors.",
    usage_occasions: &[
        "Traditional weddings",
        "Marapu rituals",
        "Harvest celebrations",
        "Initiation ceremonies",
    ],
};

pub static MANUSIA: MotifAnalysis = MotifAnalysis {
    title: "Human Motif in Sumba Weaving",
    description: "The human (manusia) motif depicts ancestors, kings and warriors. It \
        expresses respect for origins, strength and honour, and the link between the \
        physical world and the spirit world. Cloth bearing this motif carries family and \
        tribal history rather than serving as mere attire.",
    symbolism: &[
        "Respect for ancestors",
        "Power and leadership",
        "Link between physical and spirit worlds",
        "Strength and courage",
        "Family and tribal heritage",
    ],
    cultural_context: "Human figures represent revered characters from the history of \
        the tribe.",
    usage_occasions: &[
        "Royal ceremonies",
        "Ancestor veneration",
        "High-ranking customary events",
    ],
};

/// Looks up the motif record for a predicted class name.
pub fn lookup(class_name: &str) -> Option<&'static MotifAnalysis> {
    match class_name {
        "ayam" => Some(&AYAM),
        "manusia" => Some(&MANUSIA),
        _ => None,
    }
}

pub fn all() -> [(&'static str, &'static MotifAnalysis); 2] {
    [("ayam", &AYAM), ("manusia", &MANUSIA)]
}
