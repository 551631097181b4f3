use crate::entity::{EntityMeta, Registry, RegistryError, ScalarType};

pub const USER: &str = "user";
pub const ADDRESS: &str = "user_address";

pub fn user_entity() -> EntityMeta {
    EntityMeta::new(USER, "users", "id")
        .scalar("email", ScalarType::Text)
        .scalar("first_name", ScalarType::Text)
        .scalar("middle_name", ScalarType::Text)
        .scalar("last_name", ScalarType::Text)
        .secret("password")
        .scalar("created_at", ScalarType::Timestamp)
        .touched("updated_at")
        .has_many("addresses", ADDRESS, "user_id")
}

pub fn address_entity() -> EntityMeta {
    EntityMeta::new(ADDRESS, "user_addresses", "id")
        .scalar("user_id", ScalarType::Integer)
        .scalar("city", ScalarType::Text)
        .scalar("street", ScalarType::Text)
        .scalar("postal_code", ScalarType::Text)
        .scalar("created_at", ScalarType::Timestamp)
        .belongs_to("user", USER, "user_id")
}

/// Registry holding every entity of the application.
pub fn registry() -> Result<Registry, RegistryError> {
    Registry::builder().entity(user_entity()).entity(address_entity()).build()
}
