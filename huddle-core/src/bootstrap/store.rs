//! In-memory store seeding for runs without a database

use anyhow::{bail, Result};
use tracing::info;

use crate::{
    config::DevConfig,
    models::{Channel, ChannelId, User, UserId},
    MemoryStore,
};

/// Build the in-memory store and load the configured fixtures into it.
///
/// Fails if a channel names an admin or member that is not a configured user.
pub fn init_dev_store(dev: &DevConfig) -> Result<MemoryStore> {
    let store = MemoryStore::new();

    for user in &dev.users {
        store.insert_user(User {
            id: UserId::from(user.id.as_str()),
            ..User::new(user.username.as_str())
        });
    }

    for channel in &dev.channels {
        let admin_id = UserId::from(channel.admin.as_str());
        if !store.has_user(&admin_id) {
            bail!("dev channel {} names unknown admin {}", channel.id, channel.admin);
        }

        let seeded = store.insert_channel(Channel {
            id: ChannelId::from(channel.id.as_str()),
            ..Channel::new(channel.name.as_str(), admin_id, channel.access_type)
        });

        for member in &channel.members {
            let member_id = UserId::from(member.as_str());
            if !store.has_user(&member_id) {
                bail!("dev channel {} names unknown member {member}", channel.id);
            }
            store.add_member(&seeded.id, &member_id);
        }
    }

    info!(
        users = dev.users.len(),
        channels = dev.channels.len(),
        "In-memory store seeded"
    );

    Ok(store)
}
