//! Slot-name generation.
//!
//! Slot names are cosmetic but permanent identifiers, so they come from a
//! fixed vocabulary that never changes between runs. A name is three words
//! joined by hyphens, drawn uniformly with replacement.

use std::collections::HashSet;

use anyhow::Result;
use rand::seq::SliceRandom;

use crate::error::GroveError;

/// Curated vocabulary: 3-7 character lowercase words, alphabetized.
/// Append-only; removing or reordering entries would orphan existing slots'
/// aesthetic (names stay valid either way, they are stored in state).
pub const WORDS: &[&str] = &[
    "acacia", "acorn", "alder", "alpine", "amber", "antler", "apple", "arbor",
    "arch", "aspen", "aster", "atlas", "badger", "balsa", "bamboo", "bark",
    "barley", "basalt", "basil", "bay", "beacon", "beech", "berry", "birch",
    "bison", "bloom", "bluff", "bobcat", "bramble", "brass", "breeze", "briar",
    "brook", "burrow", "cabin", "cactus", "camel", "canoe", "canyon", "cedar",
    "cherry", "cinder", "citron", "clay", "cliff", "clover", "cobalt", "comet",
    "condor", "copper", "coral", "cosmos", "cotton", "cove", "coyote", "crane",
    "creek", "cricket", "crocus", "crystal", "cumin", "cypress", "dahlia",
    "daisy", "dapple", "dawn", "delta", "denim", "dew", "dingo", "dogwood",
    "dove", "drift", "dune", "dusk", "eagle", "earth", "ebony", "echo",
    "egret", "eider", "elder", "elk", "elm", "ember", "ermine", "fable",
    "falcon", "fennel", "fern", "fig", "finch", "fjord", "flint", "flora",
    "fog", "forest", "fossil", "fox", "frost", "gale", "gannet", "garnet",
    "gecko", "geyser", "ginger", "glade", "glen", "gorge", "granite", "grape",
    "gravel", "grotto", "grouse", "guava", "gull", "gust", "harbor", "hawk",
    "hazel", "heath", "heather", "hedge", "heron", "hickory", "holly", "honey",
    "horizon", "ibis", "icicle", "indigo", "inlet", "iris", "ivory", "ivy",
    "jackal", "jade", "jasmine", "jasper", "jay", "jungle", "juniper", "kelp",
    "kestrel", "kite", "kiwi", "knoll", "koala", "krill", "lagoon", "lark",
    "laurel", "lava", "leaf", "ledge", "lemon", "lemur", "lichen", "lilac",
    "lily", "linden", "lotus", "lupine", "lynx", "magma", "mango", "mantis",
    "maple", "marble", "marsh", "meadow", "melon", "mesa", "mink", "mint",
    "mist", "mole", "morel", "moss", "moth", "myrtle", "narwhal", "nebula",
    "nectar", "nettle", "newt", "night", "nimbus", "nutmeg", "oak", "oasis",
    "ocean", "ocelot", "olive", "onyx", "opal", "orca", "orchid", "oriole",
    "osprey", "otter", "owl", "palm", "pampas", "pansy", "papaya", "parrot",
    "peach", "pear", "pebble", "pecan", "peony", "pepper", "perch", "petal",
    "pine", "plum", "pollen", "pond", "poplar", "poppy", "prairie", "puffin",
    "puma", "quail", "quartz", "quill", "quince", "rain", "raptor", "raven",
    "reed", "ridge", "river", "robin", "rowan", "ruby", "rush", "russet",
    "saffron", "sage", "salmon", "sand", "sapling", "savanna", "seal", "sedge",
    "sequoia", "shade", "shale", "shell", "shore", "shrub", "sierra", "silver",
    "sleet", "sloth", "smoke", "snow", "sorrel", "spark", "spruce", "squall",
    "star", "stone", "stork", "storm", "stream", "summit", "sunset", "swamp",
    "swan", "syrup", "tansy", "taro", "teak", "tempest", "thicket", "thistle",
    "thorn", "thrush", "thyme", "tiger", "timber", "toad", "topaz", "torrent",
    "toucan", "trout", "tulip", "tundra", "turnip", "twig", "umber", "valley",
    "vapor", "velvet", "verbena", "vine", "violet", "vole", "walnut", "wasp",
    "water", "wave", "willow", "wind", "wisp", "wolf", "wren", "yarrow",
    "yew", "yucca", "zephyr", "zinnia",
];

const MAX_ATTEMPTS: usize = 100;

/// Draw a fresh `w1-w2-w3` name not present in `forbidden`.
pub fn fresh_name(forbidden: &HashSet<String>) -> Result<String> {
    fresh_name_from(WORDS, forbidden)
}

fn fresh_name_from(words: &[&str], forbidden: &HashSet<String>) -> Result<String> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_ATTEMPTS {
        let name = format!(
            "{}-{}-{}",
            words.choose(&mut rng).expect("vocabulary is non-empty"),
            words.choose(&mut rng).expect("vocabulary is non-empty"),
            words.choose(&mut rng).expect("vocabulary is non-empty"),
        );
        if !forbidden.contains(&name) {
            return Ok(name);
        }
    }
    Err(GroveError::NameExhaustion.into())
}
