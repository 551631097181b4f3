#[cfg(test)]
mod tests {
    use sqlx::SqliteConnection;

    use crate::repository::{Repository, Resource, SqlRepository};
    use crate::services::RepositoryService;
    use crate::tests::support::{test_state, user_create};
    use crate::types::{Filter, ListFilter};
    use crate::user::models::ADDRESS;
    use crate::user::schemas::{AddressInput, AddressView, UserCreate, UserUpdate, UserView};
    use crate::user::UserRepository;

    fn address(city: &str) -> AddressInput {
        AddressInput { city: Some(city.to_string()), street: Some("Main St 1".to_string()), postal_code: None }
    }

    async fn create(repo: &UserRepository, conn: &mut SqliteConnection, input: UserCreate) -> UserView {
        repo.create(conn, &input).await.unwrap()
    }

    fn list(limit: i64, offset: i64, sort: Option<&str>, search: Option<&str>) -> ListFilter {
        ListFilter { limit, offset, sort: sort.map(str::to_string), search: search.map(str::to_string) }
    }

    #[tokio::test]
    async fn create_then_get_returns_equal_view() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();

        let input = UserCreate { last_name: Some("Lovelace".into()), ..user_create("ada@example.com") };
        let created = create(&repo, &mut conn, input).await;
        assert!(created.id > 0);
        assert_eq!(created.last_name.as_deref(), Some("Lovelace"));
        assert!(created.first_name.is_none());

        let fetched = repo.get(&mut conn, &Filter::by_id(created.id)).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn get_matches_extra_fields_and_ignores_unknown_ones() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let ada = create(&repo, &mut conn, user_create("ada@example.com")).await;
        create(&repo, &mut conn, user_create("bob@example.com")).await;

        let by_email = repo.get(&mut conn, &Filter::default().eq("email", "ada@example.com")).await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(ada.id));

        let mismatch = Filter::by_id(ada.id).eq("email", "bob@example.com");
        assert!(repo.get(&mut conn, &mismatch).await.unwrap().is_none());

        let unknown = Filter::by_id(ada.id).eq("no_such_column", 1);
        assert_eq!(repo.get(&mut conn, &unknown).await.unwrap().map(|u| u.id), Some(ada.id));

        assert!(repo.get(&mut conn, &Filter::by_id(9999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nested_addresses_are_created_with_the_user() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();

        let input = UserCreate {
            addresses: Some(vec![address("Berlin"), address("Paris")]),
            ..user_create("ada@example.com")
        };
        let created = create(&repo, &mut conn, input).await;
        assert_eq!(created.addresses.len(), 2);
        assert!(created.addresses.iter().all(|a| a.user_id == created.id));

        let fetched = repo.get(&mut conn, &Filter::by_id(created.id)).await.unwrap().unwrap();
        let cities: Vec<_> = fetched.addresses.iter().map(|a| a.city.clone().unwrap()).collect();
        assert_eq!(cities, vec!["Berlin", "Paris"]);
    }

    #[tokio::test]
    async fn list_reports_total_and_paginates() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        for i in 0..5 {
            create(&repo, &mut conn, user_create(&format!("user{}@example.com", i))).await;
        }

        let page = repo.get_list(&mut conn, &list(2, 2, Some("email"), None)).await.unwrap();
        assert_eq!(page.total, 5);
        let emails: Vec<_> = page.rows.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["user2@example.com", "user3@example.com"]);

        let past_end = repo.get_list(&mut conn, &list(10, 10, None, None)).await.unwrap();
        assert!(past_end.rows.is_empty());
        assert_eq!(past_end.total, 5);

        let all = repo.get_all(&mut conn, &list(1, 0, None, None)).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn sorts_descending_by_creation_time() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let stamps = ["2024-01-01T00:00:00.000Z", "2024-03-01T00:00:00.000Z", "2024-02-01T00:00:00.000Z"];
        for (i, stamp) in stamps.iter().enumerate() {
            let user = create(&repo, &mut conn, user_create(&format!("u{}@example.com", i))).await;
            sqlx::query("UPDATE users SET created_at = ? WHERE id = ?")
                .bind(*stamp)
                .bind(user.id)
                .execute(&mut *conn)
                .await
                .unwrap();
        }

        let page = repo.get_list(&mut conn, &list(10, 0, Some("-created_at"), None)).await.unwrap();
        let emails: Vec<_> = page.rows.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["u1@example.com", "u2@example.com", "u0@example.com"]);
        assert!(page.rows.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn unknown_sort_field_is_ignored() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        for i in 0..3 {
            create(&repo, &mut conn, user_create(&format!("user{}@example.com", i))).await;
        }

        let unsorted = repo.get_list(&mut conn, &list(10, 0, None, None)).await.unwrap();
        let bogus = repo.get_list(&mut conn, &list(10, 0, Some("-no_such_field"), None)).await.unwrap();
        assert_eq!(bogus.total, 3);
        assert_eq!(bogus.rows.len(), unsorted.rows.len());
    }

    #[tokio::test]
    async fn sorts_through_to_many_relationship() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let zed = UserCreate { addresses: Some(vec![address("Zurich")]), ..user_create("zed@example.com") };
        let amy = UserCreate {
            addresses: Some(vec![address("Oslo"), address("Amsterdam")]),
            ..user_create("amy@example.com")
        };
        create(&repo, &mut conn, zed).await;
        create(&repo, &mut conn, amy).await;

        let page = repo.get_list(&mut conn, &list(10, 0, Some("addresses__city"), None)).await.unwrap();
        assert_eq!(page.total, 2);
        let emails: Vec<_> = page.rows.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["amy@example.com", "zed@example.com"]);

        let page = repo.get_list(&mut conn, &list(10, 0, Some("-addresses.city"), None)).await.unwrap();
        assert_eq!(page.rows[0].email, "zed@example.com");
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring_over_text_columns() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let input = UserCreate { first_name: Some("Grace".into()), ..user_create("hopper@navy.mil") };
        create(&repo, &mut conn, input).await;
        create(&repo, &mut conn, user_create("ada@example.com")).await;
        create(&repo, &mut conn, user_create("percent%sign@example.com")).await;

        let page = repo.get_list(&mut conn, &list(10, 0, None, Some("GRAC"))).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].email, "hopper@navy.mil");

        let page = repo.get_list(&mut conn, &list(10, 0, None, Some("example"))).await.unwrap();
        assert_eq!(page.total, 2);

        // Wildcards match literally.
        let page = repo.get_list(&mut conn, &list(10, 0, None, Some("%"))).await.unwrap();
        assert_eq!(page.total, 1);
        let page = repo.get_list(&mut conn, &list(10, 0, None, Some("_"))).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn search_does_not_match_password_hashes() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let input = UserCreate { password: "needle-in-password".into(), ..user_create("ada@example.com") };
        create(&repo, &mut conn, input).await;

        let page = repo.get_list(&mut conn, &list(10, 0, None, Some("needle"))).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn partial_update_changes_only_given_fields() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let input = UserCreate {
            first_name: Some("Ada".into()),
            last_name: Some("Byron".into()),
            ..user_create("ada@example.com")
        };
        let created = create(&repo, &mut conn, input).await;

        let update = UserUpdate { last_name: Some("Lovelace".into()), ..UserUpdate::default() };
        let updated = repo.update(&mut conn, &update, &Filter::by_id(created.id)).await.unwrap().unwrap();
        assert_eq!(updated.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(updated.first_name.as_deref(), Some("Ada"));
        assert_eq!(updated.email, created.email);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let missing = repo.update(&mut conn, &update, &Filter::by_id(created.id + 100)).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn update_aligns_nested_addresses_by_position() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let input = UserCreate {
            addresses: Some(vec![address("Berlin"), address("Paris")]),
            ..user_create("ada@example.com")
        };
        let created = create(&repo, &mut conn, input).await;

        let update = UserUpdate {
            addresses: Some(vec![AddressInput { city: Some("Hamburg".into()), ..AddressInput::default() }]),
            ..UserUpdate::default()
        };
        let updated = repo.update(&mut conn, &update, &Filter::by_id(created.id)).await.unwrap().unwrap();
        assert_eq!(updated.addresses.len(), 2);
        assert_eq!(updated.addresses[0].id, created.addresses[0].id);
        assert_eq!(updated.addresses[0].city.as_deref(), Some("Hamburg"));
        assert_eq!(updated.addresses[0].street.as_deref(), Some("Main St 1"));
        assert_eq!(updated.addresses[1], created.addresses[1]);
    }

    #[tokio::test]
    async fn delete_removes_row_once() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let created = create(&repo, &mut conn, user_create("ada@example.com")).await;

        assert!(repo.delete(&mut conn, &Filter::by_id(created.id)).await.unwrap());
        assert!(repo.get(&mut conn, &Filter::by_id(created.id)).await.unwrap().is_none());
        assert!(!repo.delete(&mut conn, &Filter::by_id(created.id)).await.unwrap());
        assert!(!repo.delete(&mut conn, &Filter::default()).await.unwrap());
    }

    #[tokio::test]
    async fn uncommitted_transaction_leaves_no_trace() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        {
            let mut tx = state.db.begin().await.unwrap();
            repo.create(&mut *tx, &user_create("ghost@example.com")).await.unwrap();
            tx.rollback().await.unwrap();
        }
        let mut conn = state.db.acquire().await.unwrap();
        let page = repo.get_list(&mut conn, &ListFilter::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    struct AddressResource;

    impl Resource for AddressResource {
        const ENTITY: &'static str = ADDRESS;
        const SORTABLE: &'static [&'static str] = &["city", "user__email"];

        type View = AddressView;
        type Create = serde_json::Value;
        type Update = serde_json::Value;
    }

    #[tokio::test]
    async fn generic_repository_serves_other_resources() {
        let (state, _db) = test_state().await;
        let users = state.users.repository().clone();
        let addresses = SqlRepository::<AddressResource>::new(state.registry.clone()).unwrap();
        let mut conn = state.db.acquire().await.unwrap();

        let ada = create(&users, &mut conn, user_create("ada@example.com")).await;
        let bob = create(&users, &mut conn, user_create("bob@example.com")).await;
        for (user, city) in [(&bob, "Oslo"), (&ada, "Rome")] {
            let input = serde_json::json!({ "user_id": user.id, "city": city });
            addresses.create(&mut conn, &input).await.unwrap();
        }

        // Sorting through a belongs-to hop.
        let page = addresses.get_list(&mut conn, &list(10, 0, Some("user__email"), None)).await.unwrap();
        let cities: Vec<_> = page.rows.iter().map(|a| a.city.clone().unwrap()).collect();
        assert_eq!(cities, vec!["Rome", "Oslo"]);

        // Not in the allowlist, so rows come back in storage order.
        let page = addresses.get_list(&mut conn, &list(10, 0, Some("-street"), None)).await.unwrap();
        assert_eq!(page.rows[0].city.as_deref(), Some("Oslo"));

        // Deleting the owner cascades.
        users.delete(&mut conn, &Filter::by_id(bob.id)).await.unwrap();
        let page = addresses.get_list(&mut conn, &ListFilter::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    /// Users without eagerly loaded relations.
    struct BareUserResource;

    impl Resource for BareUserResource {
        const ENTITY: &'static str = crate::user::models::USER;

        type View = UserView;
        type Create = UserCreate;
        type Update = UserUpdate;
    }

    #[tokio::test]
    async fn update_aligns_with_relations_outside_load() {
        let (state, _db) = test_state().await;
        let users = state.users.repository().clone();
        let bare = SqlRepository::<BareUserResource>::new(state.registry.clone()).unwrap();
        let mut conn = state.db.acquire().await.unwrap();
        let input = UserCreate { addresses: Some(vec![address("Berlin")]), ..user_create("ada@example.com") };
        let created = create(&users, &mut conn, input).await;

        let update = UserUpdate {
            addresses: Some(vec![AddressInput { city: Some("Hamburg".into()), ..AddressInput::default() }]),
            ..UserUpdate::default()
        };
        bare.update(&mut conn, &update, &Filter::by_id(created.id)).await.unwrap().unwrap();

        let fetched = users.get(&mut conn, &Filter::by_id(created.id)).await.unwrap().unwrap();
        assert_eq!(fetched.addresses.len(), 1);
        assert_eq!(fetched.addresses[0].id, created.addresses[0].id);
        assert_eq!(fetched.addresses[0].city.as_deref(), Some("Hamburg"));
        assert_eq!(fetched.addresses[0].street.as_deref(), Some("Main St 1"));
    }

    #[tokio::test]
    async fn update_maps_onto_existing_owner() {
        let (state, _db) = test_state().await;
        let users = state.users.repository().clone();
        let addresses = SqlRepository::<AddressResource>::new(state.registry.clone()).unwrap();
        let mut conn = state.db.acquire().await.unwrap();
        let input = UserCreate { addresses: Some(vec![address("Berlin")]), ..user_create("ada@example.com") };
        let ada = create(&users, &mut conn, input).await;
        let address_id = ada.addresses[0].id;

        let update = serde_json::json!({ "user": { "last_name": "Lovelace" } });
        let updated = addresses.update(&mut conn, &update, &Filter::by_id(address_id)).await.unwrap().unwrap();
        assert_eq!(updated.user_id, ada.id);

        // Two levels down: address -> user -> addresses.
        let update = serde_json::json!({ "user": { "addresses": [{ "city": "Hamburg" }] } });
        addresses.update(&mut conn, &update, &Filter::by_id(address_id)).await.unwrap().unwrap();

        let fetched = users.get(&mut conn, &Filter::by_id(ada.id)).await.unwrap().unwrap();
        assert_eq!(fetched.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(fetched.addresses.len(), 1);
        assert_eq!(fetched.addresses[0].id, address_id);
        assert_eq!(fetched.addresses[0].city.as_deref(), Some("Hamburg"));

        let total = users.get_list(&mut conn, &ListFilter::default()).await.unwrap().total;
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn search_folds_case_like_sqlite() {
        let (state, _db) = test_state().await;
        let repo = state.users.repository().clone();
        let mut conn = state.db.acquire().await.unwrap();
        let input = UserCreate { last_name: Some("Ämter".into()), ..user_create("amt@example.com") };
        create(&repo, &mut conn, input).await;

        for term in ["Ämter", "ÄMTER", "mter"] {
            let page = repo.get_list(&mut conn, &list(10, 0, None, Some(term))).await.unwrap();
            assert_eq!(page.total, 1, "search {:?}", term);
        }
    }
}
