use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HederaNetwork {
    Testnet,
    Mainnet,
}

impl FromStr for HederaNetwork {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "testnet" => Ok(HederaNetwork::Testnet),
            "mainnet" => Ok(HederaNetwork::Mainnet),
            other => Err(anyhow::anyhow!("unknown HEDERA_NETWORK: {other}")),
        }
    }
}

impl std::fmt::Display for HederaNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HederaNetwork::Testnet => write!(f, "testnet"),
            HederaNetwork::Mainnet => write!(f, "mainnet"),
        }
    }
}
