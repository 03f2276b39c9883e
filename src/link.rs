use crate::descriptor::ServerDescriptor;

/// Client-launchable URI for a server, honouring a configured override.
pub fn connect_link(server: &ServerDescriptor) -> String {
    if let Some(custom) = server.connect_link.as_deref().filter(|l| !l.trim().is_empty()) {
        return custom.to_string();
    }

    let host = server.host.trim();
    let port = server.port;

    match server.type_key().as_str() {
        "discord" => discord_link(server.discord_invite.as_deref().unwrap_or_default()),
        "minecraft" | "minecraft java" | "minecraft bedrock" => {
            format!("minecraft://{}:{}", host, port)
        }
        "teamspeak" | "teamspeak3" => format!("ts3server://{}?port={}", host, port),
        "mumble" => format!("mumble://{}:{}", host, port),
        "fivem" => format!("fivem://connect/{}:{}", host, port),
        "samp" => format!("samp://{}:{}", host, port),
        _ => format!("steam://connect/{}:{}", host, port),
    }
}

fn discord_link(invite: &str) -> String {
    let invite = invite.trim();
    if invite.is_empty() {
        "#".to_string()
    } else if invite.starts_with("http") {
        invite.to_string()
    } else if invite.contains("discord.gg/") {
        format!("https://{}", invite)
    } else {
        format!("https://discord.gg/{}", invite)
    }
}
