//! User list and report payloads.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use super::lenient;

/// A user authorized on the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    #[serde(deserialize_with = "lenient::null_default")]
    pub id: i64,
    #[serde(deserialize_with = "lenient::null_default")]
    pub uuid: String,
    /// Speed limit in Mbps, 0 = unlimited
    #[serde(deserialize_with = "lenient::null_default")]
    pub speed_limit: i64,
    /// Concurrent device limit, 0 = unlimited
    #[serde(deserialize_with = "lenient::null_default")]
    pub device_limit: i64,
}

/// Body of the user list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserListBody {
    #[serde(deserialize_with = "lenient::null_default")]
    pub users: Vec<UserInfo>,
}

/// An online connection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OnlineUser {
    pub uid: i64,
    pub ip: String,
}

/// Traffic counters of one user since the last report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserTraffic {
    pub uid: i64,
    pub upload: i64,
    pub download: i64,
}

/// Online device count per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliveMap {
    pub alive: AHashMap<i64, i64>,
}

impl AliveMap {
    /// Count distinct online IPs per user.
    pub fn from_online_users(users: &[OnlineUser]) -> Self {
        let alive = group_online_ips(users)
            .into_iter()
            .map(|(uid, ips)| (uid, ips.len() as i64))
            .collect();
        Self { alive }
    }
}

/// Group online connections into the `uid -> [ip]` shape reported to the panel.
///
/// IPs keep their first-seen order; repeated connections from one IP are merged.
pub fn group_online_ips(users: &[OnlineUser]) -> AHashMap<i64, Vec<String>> {
    let mut grouped: AHashMap<i64, Vec<String>> = AHashMap::new();
    for user in users {
        let ips = grouped.entry(user.uid).or_default();
        if !ips.contains(&user.ip) {
            ips.push(user.ip.clone());
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn online(uid: i64, ip: &str) -> OnlineUser {
        OnlineUser {
            uid,
            ip: ip.to_string(),
        }
    }

    #[test]
    fn test_user_list_decode() {
        let body: UserListBody = serde_json::from_value(json!({
            "users": [
                {"id": 1, "uuid": "a", "speed_limit": 100, "device_limit": 2},
                {"id": 2, "uuid": "b", "speed_limit": null, "device_limit": null}
            ]
        }))
        .unwrap();
        assert_eq!(body.users.len(), 2);
        assert_eq!(body.users[0].speed_limit, 100);
        assert_eq!(body.users[1].speed_limit, 0);
        assert_eq!(body.users[1].device_limit, 0);
    }

    #[test]
    fn test_user_list_keeps_duplicates() {
        let body: UserListBody = serde_json::from_value(json!({
            "users": [{"id": 1, "uuid": "a"}, {"id": 1, "uuid": "a"}]
        }))
        .unwrap();
        assert_eq!(body.users.len(), 2);
        assert_eq!(body.users[0], body.users[1]);
    }

    #[test]
    fn test_user_list_null_users() {
        let body: UserListBody = serde_json::from_value(json!({"users": null})).unwrap();
        assert!(body.users.is_empty());
    }

    #[test]
    fn test_group_online_ips() {
        let users = vec![
            online(1, "1.1.1.1"),
            online(2, "2.2.2.2"),
            online(1, "1.1.1.2"),
            online(1, "1.1.1.1"),
        ];
        let grouped = group_online_ips(&users);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.get(&1).unwrap(), &vec!["1.1.1.1", "1.1.1.2"]);
        assert_eq!(grouped.get(&2).unwrap(), &vec!["2.2.2.2"]);
    }

    #[test]
    fn test_alive_map_counts() {
        let users = vec![online(1, "1.1.1.1"), online(1, "1.1.1.2"), online(3, "3.3.3.3")];
        let alive = AliveMap::from_online_users(&users);
        assert_eq!(alive.alive.get(&1), Some(&2));
        assert_eq!(alive.alive.get(&3), Some(&1));

        let value = serde_json::to_value(&alive).unwrap();
        assert_eq!(value["alive"]["1"], 2);
    }
}
