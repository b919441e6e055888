//! Domain-side records and the hand-written pieces the generated converters call.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::wire;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Status,
    pub tags: Vec<String>,
    pub scores: BTreeMap<String, i32>,
    pub age: i32,
    pub nickname: String,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Active,
    Suspended,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
}

impl Address {
    pub fn to_wire(&self) -> wire::Address {
        wire::Address {
            street: self.street.clone(),
            city: self.city.clone(),
        }
    }
}

pub fn address_from_wire(src: &wire::Address) -> anyhow::Result<Address> {
    if src.city.is_empty() {
        anyhow::bail!("address {:?} has no city", src.street);
    }
    Ok(Address {
        street: src.street.clone(),
        city: src.city.clone(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub legacy: String,
}

fn manual_account_to_secpkg_account(src: &Account, dst: &mut wire::Account) -> anyhow::Result<()> {
    if src.legacy == "reject" {
        anyhow::bail!("legacy code {:?} has no region", src.legacy);
    }
    dst.region = src.legacy.to_uppercase();
    Ok(())
}

fn manual_secpkg_account_to_account(src: &wire::Account, dst: &mut Account) -> anyhow::Result<()> {
    dst.legacy = src.region.to_lowercase();
    Ok(())
}

mod user_convgen {
    use super::*;
    include!(concat!(env!("OUT_DIR"), "/user_convgen.rs"));
}

mod point_convgen {
    use super::*;
    include!(concat!(env!("OUT_DIR"), "/point_convgen.rs"));
}

mod tag_convgen {
    use super::*;
    include!(concat!(env!("OUT_DIR"), "/tag_convgen.rs"));
}

mod account_convgen {
    use super::*;
    include!(concat!(env!("OUT_DIR"), "/account_convgen.rs"));
}

pub use account_convgen::{account_to_secpkg_account, secpkg_account_to_account};
pub use point_convgen::secpkg_point_to_point;
pub use tag_convgen::{secpkg_tag_to_tag, tag_to_secpkg_tag};
pub use user_convgen::{secpkg_user_to_user, user_to_secpkg_user};
