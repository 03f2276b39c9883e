//! Maps free-form server type strings onto the wire protocol used to query them.

use crate::descriptor::ServerDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

pub const TEAMSPEAK_QUERY_PORT: u16 = 10011;

/// Wire protocol families with a built-in codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    SourceEngine,
    MinecraftJava,
    MinecraftBedrock,
    TeamSpeak3,
    Quake3,
    Discord,
    /// Plain TCP reachability; also the answer for anything unrecognised.
    Generic,
}

impl ProtocolKind {
    pub const ALL: [ProtocolKind; 7] = [
        ProtocolKind::SourceEngine,
        ProtocolKind::MinecraftJava,
        ProtocolKind::MinecraftBedrock,
        ProtocolKind::TeamSpeak3,
        ProtocolKind::Quake3,
        ProtocolKind::Discord,
        ProtocolKind::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::SourceEngine => "source",
            ProtocolKind::MinecraftJava => "minecraft_java",
            ProtocolKind::MinecraftBedrock => "minecraft_bedrock",
            ProtocolKind::TeamSpeak3 => "teamspeak3",
            ProtocolKind::Quake3 => "quake3",
            ProtocolKind::Discord => "discord",
            ProtocolKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the query port is derived when the descriptor does not set one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRule {
    /// Query on the game port.
    GamePort,
    /// Query on `game port + n`.
    Offset(u16),
    /// Query on a fixed well-known port.
    Fixed(u16),
    /// Always the connect port, even if a query port is configured.
    ConnectPort,
    /// No port involved.
    NotApplicable,
}

/// Result of protocol selection for one server type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSpec {
    pub kind: ProtocolKind,
    /// Canonical protocol key, as understood by enhanced backends.
    pub key: &'static str,
    pub port_rule: PortRule,
}

impl ProtocolSpec {
    const fn new(kind: ProtocolKind, key: &'static str, port_rule: PortRule) -> Self {
        Self {
            kind,
            key,
            port_rule,
        }
    }

    /// Effective query port for a descriptor. A configured query port of 0 counts
    /// as unset.
    pub fn query_port(&self, server: &ServerDescriptor) -> u16 {
        let configured = server.query_port.filter(|p| *p != 0);
        match self.port_rule {
            PortRule::NotApplicable => 0,
            PortRule::ConnectPort => server.port,
            PortRule::GamePort => configured.unwrap_or(server.port),
            PortRule::Offset(n) => {
                configured.unwrap_or_else(|| server.port.checked_add(n).unwrap_or(server.port))
            }
            PortRule::Fixed(port) => configured.unwrap_or(port),
        }
    }
}

use PortRule::*;
use ProtocolKind::*;

const SOURCE: ProtocolSpec = ProtocolSpec::new(SourceEngine, "source", GamePort);
const UNKNOWN: ProtocolSpec = ProtocolSpec::new(Generic, "source", ConnectPort);

static ALIASES: &[(&str, ProtocolSpec)] = &[
    // Minecraft
    ("minecraft", ProtocolSpec::new(MinecraftJava, "minecraft", GamePort)),
    ("minecraft java", ProtocolSpec::new(MinecraftJava, "minecraft", GamePort)),
    ("mc", ProtocolSpec::new(MinecraftJava, "minecraft", GamePort)),
    ("java", ProtocolSpec::new(MinecraftJava, "minecraft", GamePort)),
    ("minecraft bedrock", ProtocolSpec::new(MinecraftBedrock, "minecraftpe", GamePort)),
    ("mcpe", ProtocolSpec::new(MinecraftBedrock, "minecraftpe", GamePort)),
    ("bedrock", ProtocolSpec::new(MinecraftBedrock, "minecraftpe", GamePort)),
    // Source engine and A2S speakers
    ("source", SOURCE),
    ("csgo", ProtocolSpec::new(SourceEngine, "csgo", GamePort)),
    ("cs2", ProtocolSpec::new(SourceEngine, "cs2", GamePort)),
    ("css", ProtocolSpec::new(SourceEngine, "css", GamePort)),
    ("cs16", ProtocolSpec::new(SourceEngine, "cs16", GamePort)),
    ("cs", ProtocolSpec::new(SourceEngine, "cs16", GamePort)),
    ("cscz", ProtocolSpec::new(SourceEngine, "cscz", GamePort)),
    ("tf2", ProtocolSpec::new(SourceEngine, "tf2", GamePort)),
    ("tf", ProtocolSpec::new(SourceEngine, "tf2", GamePort)),
    ("gmod", ProtocolSpec::new(SourceEngine, "gmod", GamePort)),
    ("garrysmod", ProtocolSpec::new(SourceEngine, "gmod", GamePort)),
    ("left4dead", ProtocolSpec::new(SourceEngine, "left4dead", GamePort)),
    ("l4d", ProtocolSpec::new(SourceEngine, "left4dead", GamePort)),
    ("left4dead2", ProtocolSpec::new(SourceEngine, "left4dead2", GamePort)),
    ("l4d2", ProtocolSpec::new(SourceEngine, "left4dead2", GamePort)),
    ("hl", ProtocolSpec::new(SourceEngine, "halflife", GamePort)),
    ("halflife", ProtocolSpec::new(SourceEngine, "halflife", GamePort)),
    ("hl2", ProtocolSpec::new(SourceEngine, "hl2dm", GamePort)),
    ("hl2dm", ProtocolSpec::new(SourceEngine, "hl2dm", GamePort)),
    ("dod", ProtocolSpec::new(SourceEngine, "dod", GamePort)),
    ("dods", ProtocolSpec::new(SourceEngine, "dods", GamePort)),
    ("rust", ProtocolSpec::new(SourceEngine, "rust", Offset(400))),
    ("ark", ProtocolSpec::new(SourceEngine, "arkse", Offset(1))),
    ("arkse", ProtocolSpec::new(SourceEngine, "arkse", Offset(1))),
    ("atlas", ProtocolSpec::new(SourceEngine, "atlas", Offset(1))),
    ("valheim", ProtocolSpec::new(SourceEngine, "valheim", Offset(1))),
    ("vrising", ProtocolSpec::new(SourceEngine, "vrising", GamePort)),
    ("scum", ProtocolSpec::new(SourceEngine, "scum", GamePort)),
    ("dayz", ProtocolSpec::new(SourceEngine, "dayz", GamePort)),
    ("dayzmod", ProtocolSpec::new(SourceEngine, "dayzmod", GamePort)),
    ("7daystodie", ProtocolSpec::new(SourceEngine, "7d2d", GamePort)),
    ("7d2d", ProtocolSpec::new(SourceEngine, "7d2d", GamePort)),
    ("unturned", ProtocolSpec::new(SourceEngine, "unturned", GamePort)),
    ("zomboid", ProtocolSpec::new(SourceEngine, "zomboid", GamePort)),
    ("projectzomboid", ProtocolSpec::new(SourceEngine, "zomboid", GamePort)),
    ("conanexiles", ProtocolSpec::new(SourceEngine, "conanexiles", GamePort)),
    ("ce", ProtocolSpec::new(SourceEngine, "conanexiles", GamePort)),
    // Quake 3 getstatus family
    ("quake3", ProtocolSpec::new(Quake3, "quake3", GamePort)),
    ("q3", ProtocolSpec::new(Quake3, "quake3", GamePort)),
    ("quake3arena", ProtocolSpec::new(Quake3, "quake3", GamePort)),
    ("q3a", ProtocolSpec::new(Quake3, "quake3", GamePort)),
    ("quakelive", ProtocolSpec::new(Quake3, "quakelive", GamePort)),
    ("ql", ProtocolSpec::new(Quake3, "quakelive", GamePort)),
    ("cod", ProtocolSpec::new(Quake3, "cod", GamePort)),
    ("cod2", ProtocolSpec::new(Quake3, "cod2", GamePort)),
    ("cod4", ProtocolSpec::new(Quake3, "cod4", GamePort)),
    ("codmw", ProtocolSpec::new(Quake3, "cod4", GamePort)),
    // Voice
    ("teamspeak", ProtocolSpec::new(TeamSpeak3, "teamspeak3", Fixed(TEAMSPEAK_QUERY_PORT))),
    ("teamspeak3", ProtocolSpec::new(TeamSpeak3, "teamspeak3", Fixed(TEAMSPEAK_QUERY_PORT))),
    ("ts3", ProtocolSpec::new(TeamSpeak3, "teamspeak3", Fixed(TEAMSPEAK_QUERY_PORT))),
    ("ts", ProtocolSpec::new(TeamSpeak3, "teamspeak3", Fixed(TEAMSPEAK_QUERY_PORT))),
    ("mumble", ProtocolSpec::new(Generic, "mumble", ConnectPort)),
    ("ventrilo", ProtocolSpec::new(Generic, "ventrilo", ConnectPort)),
    ("vent", ProtocolSpec::new(Generic, "ventrilo", ConnectPort)),
    ("discord", ProtocolSpec::new(Discord, "discord", NotApplicable)),
    // Known to enhanced backends only; built-in probing is a TCP check
    ("quake", ProtocolSpec::new(Generic, "quake", ConnectPort)),
    ("quake1", ProtocolSpec::new(Generic, "quake", ConnectPort)),
    ("quake2", ProtocolSpec::new(Generic, "quake2", ConnectPort)),
    ("quake4", ProtocolSpec::new(Generic, "quake4", ConnectPort)),
    ("q4", ProtocolSpec::new(Generic, "quake4", ConnectPort)),
    ("codmw2", ProtocolSpec::new(Generic, "codmw2", ConnectPort)),
    ("codmw3", ProtocolSpec::new(Generic, "codmw3", ConnectPort)),
    ("codbo", ProtocolSpec::new(Generic, "codbo", ConnectPort)),
    ("codbo2", ProtocolSpec::new(Generic, "codbo2", ConnectPort)),
    ("codbo3", ProtocolSpec::new(Generic, "codbo3", ConnectPort)),
    ("codaw", ProtocolSpec::new(Generic, "codaw", ConnectPort)),
    ("codiw", ProtocolSpec::new(Generic, "codiw", ConnectPort)),
    ("codww2", ProtocolSpec::new(Generic, "codww2", ConnectPort)),
    ("bf", ProtocolSpec::new(Generic, "bf1942", ConnectPort)),
    ("bf1942", ProtocolSpec::new(Generic, "bf1942", ConnectPort)),
    ("bfv", ProtocolSpec::new(Generic, "bfv", ConnectPort)),
    ("bf2", ProtocolSpec::new(Generic, "bf2", ConnectPort)),
    ("bf2142", ProtocolSpec::new(Generic, "bf2142", ConnectPort)),
    ("bfbc2", ProtocolSpec::new(Generic, "bfbc2", ConnectPort)),
    ("bf3", ProtocolSpec::new(Generic, "bf3", ConnectPort)),
    ("bf4", ProtocolSpec::new(Generic, "bf4", ConnectPort)),
    ("bf1", ProtocolSpec::new(Generic, "bf1", ConnectPort)),
    ("bfh", ProtocolSpec::new(Generic, "bfh", ConnectPort)),
    ("unreal", ProtocolSpec::new(Generic, "unreal", ConnectPort)),
    ("unreal2", ProtocolSpec::new(Generic, "unreal2", ConnectPort)),
    ("ut", ProtocolSpec::new(Generic, "ut", ConnectPort)),
    ("ut2003", ProtocolSpec::new(Generic, "ut2003", ConnectPort)),
    ("ut2004", ProtocolSpec::new(Generic, "ut2004", ConnectPort)),
    ("ut3", ProtocolSpec::new(Generic, "ut3", ConnectPort)),
    ("fivem", ProtocolSpec::new(Generic, "fivem", ConnectPort)),
    ("gtav", ProtocolSpec::new(Generic, "fivem", ConnectPort)),
    ("redm", ProtocolSpec::new(Generic, "redm", ConnectPort)),
    ("samp", ProtocolSpec::new(Generic, "samp", ConnectPort)),
    ("sampvoice", ProtocolSpec::new(Generic, "sampvoice", ConnectPort)),
    ("mta", ProtocolSpec::new(Generic, "mta", ConnectPort)),
    ("mtasa", ProtocolSpec::new(Generic, "mta", ConnectPort)),
    ("ragemp", ProtocolSpec::new(Generic, "ragemp", ConnectPort)),
    ("rage", ProtocolSpec::new(Generic, "ragemp", ConnectPort)),
];

static TABLE: LazyLock<HashMap<&'static str, ProtocolSpec>> =
    LazyLock::new(|| ALIASES.iter().copied().collect());

/// Pick the protocol for a server type. Case and surrounding whitespace are
/// ignored; unknown types get the generic probe rather than an error.
pub fn select_protocol(server_type: &str) -> ProtocolSpec {
    let key = server_type.trim().to_lowercase();
    TABLE.get(key.as_str()).copied().unwrap_or(UNKNOWN)
}

static DISPLAY_NAMES: &[(&str, &str)] = &[
    ("minecraft", "Minecraft"),
    ("minecraft java", "Minecraft Java"),
    ("minecraft bedrock", "Minecraft Bedrock"),
    ("mcpe", "Minecraft Bedrock"),
    ("csgo", "CS:GO"),
    ("cs2", "Counter-Strike 2"),
    ("css", "CS:Source"),
    ("tf2", "Team Fortress 2"),
    ("gmod", "Garry's Mod"),
    ("rust", "Rust"),
    ("ark", "ARK"),
    ("valheim", "Valheim"),
    ("discord", "Discord"),
    ("teamspeak", "TeamSpeak 3"),
    ("teamspeak3", "TeamSpeak 3"),
    ("ts3", "TeamSpeak 3"),
    ("mumble", "Mumble"),
    ("fivem", "FiveM"),
    ("redm", "RedM"),
    ("samp", "SA-MP"),
    ("mta", "MTA:SA"),
    ("ragemp", "RAGE MP"),
];

/// Human label for a server type, e.g. `"cs2"` -> `"Counter-Strike 2"`.
pub fn display_name(server_type: &str) -> String {
    let key = server_type.trim().to_lowercase();
    DISPLAY_NAMES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| title_case(server_type.trim()))
}

/// Uppercases the first character, leaving the rest alone.
pub fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_ignores_case_and_padding() {
        let a = select_protocol("CSGO");
        assert_eq!(a, select_protocol("csgo"));
        assert_eq!(a, select_protocol(" csgo "));
        assert_eq!(a.kind, ProtocolKind::SourceEngine);
    }

    #[test]
    fn synonyms_share_a_codec() {
        assert_eq!(select_protocol("mc").kind, ProtocolKind::MinecraftJava);
        assert_eq!(select_protocol("Minecraft Java").kind, ProtocolKind::MinecraftJava);
        assert_eq!(select_protocol("mcpe").kind, ProtocolKind::MinecraftBedrock);
        assert_eq!(select_protocol("ts3").kind, ProtocolKind::TeamSpeak3);
        assert_eq!(select_protocol("q3a").kind, ProtocolKind::Quake3);
        assert_eq!(select_protocol("discord").kind, ProtocolKind::Discord);
    }

    #[test]
    fn unknown_types_degrade_to_generic() {
        let spec = select_protocol("some-new-game");
        assert_eq!(spec.kind, ProtocolKind::Generic);
        assert_eq!(spec.key, "source");
        assert_eq!(select_protocol("").kind, ProtocolKind::Generic);
    }

    #[test]
    fn query_port_derivation() {
        let rust = ServerDescriptor::new("r", "rust", "h", 28015);
        assert_eq!(select_protocol("rust").query_port(&rust), 28415);

        let ts = ServerDescriptor::new("t", "teamspeak3", "h", 9987);
        assert_eq!(select_protocol("teamspeak3").query_port(&ts), 10011);

        let valheim = ServerDescriptor::new("v", "valheim", "h", 2456);
        assert_eq!(select_protocol("valheim").query_port(&valheim), 2457);

        let cs = ServerDescriptor::new("c", "cs2", "h", 27015);
        assert_eq!(select_protocol("cs2").query_port(&cs), 27015);
    }

    #[test]
    fn explicit_query_port_wins_except_for_connect_checks() {
        let rust = ServerDescriptor::new("r", "rust", "h", 28015).with_query_port(28016);
        assert_eq!(select_protocol("rust").query_port(&rust), 28016);

        let zero = ServerDescriptor::new("r", "rust", "h", 28015).with_query_port(0);
        assert_eq!(select_protocol("rust").query_port(&zero), 28415);

        let fivem = ServerDescriptor::new("f", "fivem", "h", 30120).with_query_port(40000);
        assert_eq!(select_protocol("fivem").query_port(&fivem), 30120);
    }

    #[test]
    fn offset_never_overflows() {
        let server = ServerDescriptor::new("r", "rust", "h", 65500);
        assert_eq!(select_protocol("rust").query_port(&server), 65500);
    }

    #[test]
    fn display_names_fall_back_to_title_case() {
        assert_eq!(display_name("CS2"), "Counter-Strike 2");
        assert_eq!(display_name("squad"), "Squad");
        assert_eq!(title_case(""), "");
    }
}
