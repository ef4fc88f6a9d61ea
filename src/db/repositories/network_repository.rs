// Read-only access to networks and their configured wallet addresses

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashMap;
use std::fmt;

use crate::db::DbError;
use crate::domain::{Chain, NetworkWallets};
use crate::entity::{networks, wallet_addresses};

#[derive(Clone)]
pub struct NetworkRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for NetworkRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkRepository").finish_non_exhaustive()
    }
}

/// Groups wallet rows per chain, dropping blank and duplicate addresses
fn group_wallets(network: networks::Model, rows: &[wallet_addresses::Model]) -> NetworkWallets {
    let mut grouped = NetworkWallets {
        id: network.id,
        name: network.name,
        ..NetworkWallets::default()
    };

    for row in rows {
        let address = row.address.trim();
        if address.is_empty() {
            continue;
        }
        let chain = match row.chain.parse::<Chain>() {
            Ok(chain) => chain,
            Err(e) => {
                tracing::warn!(network = %grouped.id, "Skipping wallet {}: {}", row.id, e);
                continue;
            }
        };
        let list = grouped.wallets.get_mut(chain);
        if !list.iter().any(|a| a == address) {
            list.push(address.to_string());
        }
    }

    grouped
}

impl NetworkRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Network by id regardless of its active flag
    pub async fn find_by_id(&self, network_id: &str) -> Result<Option<networks::Model>, DbError> {
        networks::Entity::find_by_id(network_id.to_string())
            .one(&self.conn)
            .await
            .map_err(Into::into)
    }

    /// Active network with its wallets, `None` if unknown or inactive
    pub async fn find_active(&self, network_id: &str) -> Result<Option<NetworkWallets>, DbError> {
        let network = networks::Entity::find_by_id(network_id.to_string())
            .filter(networks::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        let Some(network) = network else {
            return Ok(None);
        };

        let rows = wallet_addresses::Entity::find()
            .filter(wallet_addresses::Column::NetworkId.eq(network_id))
            .order_by_asc(wallet_addresses::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(Some(group_wallets(network, &rows)))
    }

    /// All active networks with their wallets, ordered by name
    pub async fn find_all_active(&self) -> Result<Vec<NetworkWallets>, DbError> {
        let networks = networks::Entity::find()
            .filter(networks::Column::IsActive.eq(true))
            .order_by_asc(networks::Column::Name)
            .order_by_asc(networks::Column::Id)
            .all(&self.conn)
            .await?;

        let ids: Vec<String> = networks.iter().map(|n| n.id.clone()).collect();
        let rows = wallet_addresses::Entity::find()
            .filter(wallet_addresses::Column::NetworkId.is_in(ids))
            .order_by_asc(wallet_addresses::Column::Id)
            .all(&self.conn)
            .await?;

        let mut by_network: HashMap<String, Vec<wallet_addresses::Model>> = HashMap::new();
        for row in rows {
            by_network.entry(row.network_id.clone()).or_default().push(row);
        }

        Ok(networks
            .into_iter()
            .map(|n| {
                let rows = by_network.remove(&n.id).unwrap_or_default();
                group_wallets(n, &rows)
            })
            .collect())
    }

    /// Active networks holding at least one wallet, the scope of a full run
    pub async fn find_scrapable(&self) -> Result<Vec<NetworkWallets>, DbError> {
        let networks = self.find_all_active().await?;
        Ok(networks.into_iter().filter(|n| n.has_wallets()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(id: i32, chain: &str, address: &str) -> wallet_addresses::Model {
        wallet_addresses::Model {
            id,
            network_id: "n1".into(),
            chain: chain.into(),
            address: address.into(),
        }
    }

    #[test]
    fn test_group_wallets_skips_blank_unknown_and_duplicates() {
        let network = networks::Model {
            id: "n1".into(),
            name: "Alpha".into(),
            is_active: true,
        };
        let rows = vec![
            wallet(1, "bitcoin", "bc1qxyz"),
            wallet(2, "bitcoin", " bc1qxyz "),
            wallet(3, "ethereum", "   "),
            wallet(4, "solana", "So1ana"),
            wallet(5, "tron", "TXYZ"),
            wallet(6, "ethereum", "0xabc"),
        ];

        let grouped = group_wallets(network, &rows);
        assert_eq!(grouped.wallets.bitcoin, vec!["bc1qxyz".to_string()]);
        assert_eq!(grouped.wallets.ethereum, vec!["0xabc".to_string()]);
        assert_eq!(grouped.wallets.tron, vec!["TXYZ".to_string()]);
        assert_eq!(grouped.wallet_count(), 3);
    }
}
