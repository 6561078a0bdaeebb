use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatrelay")]
#[command(version, about = "Chat with a ChatRelay server from the terminal")]
pub struct Cli {
    /// WebSocket endpoint of the relay
    #[arg(long, env = "CHATRELAY_URL", default_value = "ws://localhost:8080/chat")]
    pub url: String,

    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    pub message: Option<String>,

    /// Enable verbose logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
