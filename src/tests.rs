#[cfg(test)]
mod integration_tests {
    use crate::handlers::public::TEAPOT_BODY;
    use crate::test_utils::test_utils::{
        TEST_PASSWORD, init_test_tracing, login, seed_participant, seed_schedule, seed_user,
        setup_test_server,
    };
    use axum::http::StatusCode;
    use axum_test::{TestResponse, TestServer};
    use cookie::Cookie;
    use model::entities::{
        donation, event, event_schedule, milestone, participant, registration, survey, user,
    };
    use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

    fn assert_redirect(response: &TestResponse, location: &str) {
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.header("location"), location);
    }

    fn signup_form<'a>(username: &'a str, email: &'a str) -> Vec<(&'static str, &'a str)> {
        vec![
            ("username", username),
            ("password", TEST_PASSWORD),
            ("confirm_password", TEST_PASSWORD),
            ("first_name", "Bob"),
            ("last_name", "Builder"),
            ("email", email),
            ("account_type", "student"),
        ]
    }

    async fn get_with(server: &TestServer, path: &str, cookie: &Cookie<'static>) -> TestResponse {
        server.get(path).add_cookie(cookie.clone()).await
    }

    #[tokio::test]
    async fn test_teapot() {
        let _guard = init_test_tracing();
        let (server, _) = setup_test_server().await;

        let response = server.get("/teapot").await;
        response.assert_status(StatusCode::IM_A_TEAPOT);
        response.assert_text(TEAPOT_BODY);
    }

    #[tokio::test]
    async fn test_health_check() {
        let (server, _) = setup_test_server().await;

        let response = server.get("/health").await;
        response.assert_status_ok();
        assert!(response.text().contains("status: healthy"));
    }

    #[tokio::test]
    async fn test_public_pages_render_for_guests() {
        let (server, _) = setup_test_server().await;

        for path in ["/", "/login", "/signup", "/donate"] {
            server.get(path).await.assert_status_ok();
        }
    }

    #[tokio::test]
    async fn test_guest_is_redirected_from_protected_pages() {
        let (server, _) = setup_test_server().await;

        for path in ["/participants", "/events", "/survey", "/milestones", "/account"] {
            assert_redirect(&server.get(path).await, "/login");
        }
        for path in ["/admin/dashboard", "/admin/users", "/admin/donations"] {
            assert_redirect(&server.get(path).await, "/");
        }
    }

    #[tokio::test]
    async fn test_user_is_redirected_from_manager_pages() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "robin", user::UserLevel::User, false).await;
        let cookie = login(&server, "robin").await;

        for path in [
            "/admin/dashboard",
            "/admin/users",
            "/admin/donations",
            "/admin/survey-data",
            "/events/add",
        ] {
            assert_redirect(&get_with(&server, path, &cookie).await, "/");
        }
        get_with(&server, "/participants", &cookie).await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_login_lands_by_role() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "director", user::UserLevel::Manager, false).await;
        seed_user(&state.db, "robin", user::UserLevel::User, false).await;

        let manager = server
            .post("/login")
            .form(&[("username", "director"), ("password", TEST_PASSWORD)])
            .await;
        assert_redirect(&manager, "/admin/dashboard");

        let user = server
            .post("/login")
            .form(&[("username", "robin"), ("password", TEST_PASSWORD)])
            .await;
        assert_redirect(&user, "/");

        let wrong = server
            .post("/login")
            .form(&[("username", "robin"), ("password", "not-the-password")])
            .await;
        wrong.assert_status_ok();
        assert!(wrong.text().contains("Invalid username or password."));
    }

    #[tokio::test]
    async fn test_signup_rejects_username_differing_only_in_case() {
        let (server, state) = setup_test_server().await;

        let first = server.post("/signup").form(&signup_form("bob", "bob@example.com")).await;
        assert_redirect(&first, "/");

        let second = server.post("/signup").form(&signup_form("Bob", "bob2@example.com")).await;
        second.assert_status_ok();
        assert!(second.text().contains("is already taken"));

        assert_eq!(user::Entity::find().count(&state.db).await.unwrap(), 1);
        // The student got a participant linked to the account
        let linked = participant::Entity::find()
            .filter(participant::Column::Username.eq("bob"))
            .count(&state.db)
            .await
            .unwrap();
        assert_eq!(linked, 1);
    }

    #[tokio::test]
    async fn test_admin_add_rejects_username_differing_only_in_case() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "director", user::UserLevel::Manager, false).await;
        seed_user(&state.db, "bob", user::UserLevel::User, false).await;
        let cookie = login(&server, "director").await;

        let response = server
            .post("/admin/users/add")
            .add_cookie(cookie)
            .form(&[
                ("username", "BOB"),
                ("password", TEST_PASSWORD),
                ("first_name", "Bob"),
                ("last_name", "Again"),
                ("level", "U"),
            ])
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("is already taken"));
        assert_eq!(user::Entity::find().count(&state.db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_participant_delete_follows_ownership() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "alice", user::UserLevel::User, false).await;
        seed_user(&state.db, "director", user::UserLevel::Manager, false).await;
        let own = seed_participant(&state.db, "Alice", Some("alice")).await;
        let other = seed_participant(&state.db, "Olu", Some("someone")).await;

        let alice = login(&server, "alice").await;
        let denied = server
            .post(&format!("/participants/delete/{}", other.id))
            .add_cookie(alice.clone())
            .await;
        assert_redirect(&denied, "/");
        assert!(participant::Entity::find_by_id(other.id).one(&state.db).await.unwrap().is_some());

        let allowed = server
            .post(&format!("/participants/delete/{}", own.id))
            .add_cookie(alice)
            .await;
        assert_redirect(&allowed, "/participants");
        assert!(participant::Entity::find_by_id(own.id).one(&state.db).await.unwrap().is_none());

        let director = login(&server, "director").await;
        let managed = server
            .post(&format!("/participants/delete/{}", other.id))
            .add_cookie(director)
            .await;
        assert_redirect(&managed, "/participants");
        assert!(participant::Entity::find_by_id(other.id).one(&state.db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_participant_edit_follows_ownership() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "alice", user::UserLevel::User, false).await;
        let other = seed_participant(&state.db, "Olu", Some("someone")).await;
        let alice = login(&server, "alice").await;

        let form = server
            .get(&format!("/participants/edit/{}", other.id))
            .add_cookie(alice.clone())
            .await;
        assert_redirect(&form, "/");

        let missing = server.get("/participants/edit/9999").add_cookie(alice).await;
        missing.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parent_registration_sync() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "parent", user::UserLevel::User, true).await;
        let schedule = seed_schedule(&state.db, "Coding Club").await;
        let a = seed_participant(&state.db, "Ava", Some("parent")).await;
        let b = seed_participant(&state.db, "Ben", Some("parent")).await;
        let cookie = login(&server, "parent").await;

        let schedule_id = schedule.id.to_string();
        let (a_id, b_id) = (a.id.to_string(), b.id.to_string());
        let both = [
            ("event_schedule_id", schedule_id.as_str()),
            ("participant_ids", a_id.as_str()),
            ("participant_ids", b_id.as_str()),
        ];

        for _ in 0..2 {
            let response = server
                .post("/events/register")
                .add_cookie(cookie.clone())
                .form(&both)
                .await;
            assert_redirect(&response, "/events");
            assert_eq!(registration::Entity::find().count(&state.db).await.unwrap(), 2);
        }

        let only_b = [
            ("event_schedule_id", schedule_id.as_str()),
            ("participant_ids", b_id.as_str()),
        ];
        server
            .post("/events/register")
            .add_cookie(cookie)
            .form(&only_b)
            .await;
        let remaining: Vec<registration::Model> =
            registration::Entity::find().all(&state.db).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].participant_id, b.id);
    }

    #[tokio::test]
    async fn test_user_cannot_register_someone_else() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "alice", user::UserLevel::User, false).await;
        let schedule = seed_schedule(&state.db, "Coding Club").await;
        seed_participant(&state.db, "Alice", Some("alice")).await;
        let other = seed_participant(&state.db, "Olu", None).await;
        let cookie = login(&server, "alice").await;

        let schedule_id = schedule.id.to_string();
        let other_id = other.id.to_string();
        let response = server
            .post("/events/register")
            .add_cookie(cookie.clone())
            .form(&[("event_schedule_id", schedule_id.as_str()), ("participant_id", other_id.as_str())])
            .await;
        assert_redirect(&response, "/");
        assert_eq!(registration::Entity::find().count(&state.db).await.unwrap(), 0);

        // Without a participant id the user's own participant is registered
        let own = server
            .post("/events/register")
            .add_cookie(cookie)
            .form(&[("event_schedule_id", schedule_id.as_str())])
            .await;
        assert_redirect(&own, "/events");
        assert_eq!(registration::Entity::find().count(&state.db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_public_donation_reuses_participant_by_email() {
        let (server, state) = setup_test_server().await;

        for (email, amount) in [("Dana@Example.com", "25.00"), ("dana@example.COM", "10")] {
            let response = server
                .post("/donate")
                .form(&[
                    ("first_name", "Dana"),
                    ("last_name", "Ruiz"),
                    ("email", email),
                    ("amount", amount),
                ])
                .await;
            response.assert_status_ok();
            assert!(response.text().contains("Thank you"));
        }

        assert_eq!(participant::Entity::find().count(&state.db).await.unwrap(), 1);
        assert_eq!(donation::Entity::find().count(&state.db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_public_donation_rejects_bad_amount() {
        let (server, state) = setup_test_server().await;

        let response = server
            .post("/donate")
            .form(&[
                ("first_name", "Dana"),
                ("last_name", "Ruiz"),
                ("email", "dana@example.com"),
                ("amount", "-5"),
            ])
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("Amount must be greater than zero."));
        assert_eq!(participant::Entity::find().count(&state.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_survey_submit_buckets_recommendation() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "alice", user::UserLevel::User, false).await;
        let own = seed_participant(&state.db, "Alice", Some("alice")).await;
        let schedule = seed_schedule(&state.db, "Coding Club").await;
        let cookie = login(&server, "alice").await;

        let participant_id = own.id.to_string();
        let schedule_id = schedule.id.to_string();
        let response = server
            .post("/survey/submit")
            .add_cookie(cookie.clone())
            .form(&[
                ("participant_id", participant_id.as_str()),
                ("event_schedule_id", schedule_id.as_str()),
                ("satisfaction_score", "5"),
                ("usefulness_score", "4"),
                ("instructor_score", "5"),
                ("recommendation_score", "3"),
            ])
            .await;
        assert_redirect(&response, "/survey");

        let saved = survey::Entity::find().one(&state.db).await.unwrap().unwrap();
        assert_eq!(saved.nps_bucket, survey::NpsBucket::Detractor);

        let invalid = server
            .post("/survey/submit")
            .add_cookie(cookie)
            .form(&[
                ("participant_id", participant_id.as_str()),
                ("event_schedule_id", schedule_id.as_str()),
                ("satisfaction_score", "5"),
                ("usefulness_score", "4"),
                ("instructor_score", "5"),
                ("recommendation_score", "11"),
            ])
            .await;
        invalid.assert_status_ok();
        assert!(invalid.text().contains("between 0 and 10"));
        assert_eq!(survey::Entity::find().count(&state.db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tampered_session_cookie_is_rejected() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "robin", user::UserLevel::User, false).await;
        let cookie = login(&server, "robin").await;
        get_with(&server, "/account", &cookie).await.assert_status_ok();

        let mut value = cookie.value().to_string();
        let last = if value.ends_with('A') { 'B' } else { 'A' };
        value.pop();
        value.push(last);
        let forged = Cookie::new(cookie.name().to_string(), value);
        assert_redirect(&get_with(&server, "/account", &forged).await, "/login");
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "robin", user::UserLevel::User, false).await;
        let cookie = login(&server, "robin").await;

        assert_redirect(&get_with(&server, "/logout", &cookie).await, "/");
        assert_redirect(&get_with(&server, "/account", &cookie).await, "/login");
        assert_eq!(state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn test_manager_cannot_delete_self() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "director", user::UserLevel::Manager, false).await;
        let cookie = login(&server, "director").await;

        let response = server
            .post("/admin/users/delete/director")
            .add_cookie(cookie)
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("You cannot delete your own account."));
        assert_eq!(user::Entity::find().count(&state.db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dashboard_and_lists_render_for_manager() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "director", user::UserLevel::Manager, false).await;
        seed_participant(&state.db, "Ava", None).await;
        seed_schedule(&state.db, "Coding Club").await;
        let cookie = login(&server, "director").await;

        for path in [
            "/admin/dashboard",
            "/admin/users",
            "/admin/donations",
            "/admin/survey-data",
            "/participants",
            "/events",
            "/survey",
            "/milestones",
            "/events/add",
            "/survey/submit",
            "/admin/donations/add",
            "/admin/users/add",
        ] {
            get_with(&server, path, &cookie).await.assert_status_ok();
        }
    }

    #[tokio::test]
    async fn test_account_password_keeps_surrounding_spaces() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "robin", user::UserLevel::User, false).await;
        let cookie = login(&server, "robin").await;

        let spaced = "  spaced pass  ";
        let saved = server
            .post("/account")
            .add_cookie(cookie)
            .form(&[
                ("username", "robin"),
                ("first_name", "Robin"),
                ("last_name", "Tester"),
                ("new_password", spaced),
                ("confirm_password", spaced),
            ])
            .await;
        assert_redirect(&saved, "/account?saved=1");

        let exact = server
            .post("/login")
            .form(&[("username", "robin"), ("password", spaced)])
            .await;
        assert_redirect(&exact, "/");

        let trimmed = server
            .post("/login")
            .form(&[("username", "robin"), ("password", spaced.trim())])
            .await;
        trimmed.assert_status_ok();
        assert!(trimmed.text().contains("Invalid username or password."));
    }

    #[tokio::test]
    async fn test_survey_edit_rebuckets_and_follows_ownership() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "alice", user::UserLevel::User, false).await;
        seed_user(&state.db, "olu", user::UserLevel::User, false).await;
        let own = seed_participant(&state.db, "Alice", Some("alice")).await;
        let schedule = seed_schedule(&state.db, "Coding Club").await;
        let alice = login(&server, "alice").await;

        let participant_id = own.id.to_string();
        let schedule_id = schedule.id.to_string();
        let scores = |recommendation: &'static str| {
            vec![
                ("participant_id", participant_id.clone()),
                ("event_schedule_id", schedule_id.clone()),
                ("satisfaction_score", "4".to_string()),
                ("usefulness_score", "4".to_string()),
                ("instructor_score", "4".to_string()),
                ("recommendation_score", recommendation.to_string()),
            ]
        };

        let submitted = server
            .post("/survey/submit")
            .add_cookie(alice.clone())
            .form(&scores("2"))
            .await;
        assert_redirect(&submitted, "/survey");
        let saved = survey::Entity::find().one(&state.db).await.unwrap().unwrap();
        assert_eq!(saved.nps_bucket, survey::NpsBucket::Detractor);
        let edit_path = format!("/survey/edit/{}", saved.id);

        // Someone else's survey cannot be touched
        let olu = login(&server, "olu").await;
        assert_redirect(&get_with(&server, &edit_path, &olu).await, "/");
        let denied = server
            .post(&edit_path)
            .add_cookie(olu.clone())
            .form(&scores("9"))
            .await;
        assert_redirect(&denied, "/");
        let denied_delete = server
            .post(&format!("/survey/delete/{}", saved.id))
            .add_cookie(olu)
            .await;
        assert_redirect(&denied_delete, "/");
        let unchanged = survey::Entity::find_by_id(saved.id).one(&state.db).await.unwrap().unwrap();
        assert_eq!(unchanged.nps_bucket, survey::NpsBucket::Detractor);

        for (recommendation, bucket) in [
            ("9", survey::NpsBucket::Promoter),
            ("4", survey::NpsBucket::Passive),
            ("0", survey::NpsBucket::Detractor),
        ] {
            let edited = server
                .post(&edit_path)
                .add_cookie(alice.clone())
                .form(&scores(recommendation))
                .await;
            assert_redirect(&edited, "/survey");
            let updated = survey::Entity::find_by_id(saved.id).one(&state.db).await.unwrap().unwrap();
            assert_eq!(updated.recommendation_score.to_string(), recommendation);
            assert_eq!(updated.nps_bucket, bucket);
        }
    }

    #[tokio::test]
    async fn test_unregister_follows_ownership() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "alice", user::UserLevel::User, false).await;
        seed_user(&state.db, "olu", user::UserLevel::User, false).await;
        let schedule = seed_schedule(&state.db, "Coding Club").await;
        let own = seed_participant(&state.db, "Alice", Some("alice")).await;
        let alice = login(&server, "alice").await;

        let schedule_id = schedule.id.to_string();
        let registered = server
            .post("/events/register")
            .add_cookie(alice.clone())
            .form(&[("event_schedule_id", schedule_id.as_str())])
            .await;
        assert_redirect(&registered, "/events");
        assert_eq!(registration::Entity::find().count(&state.db).await.unwrap(), 1);

        let own_id = own.id.to_string();
        let olu = login(&server, "olu").await;
        let denied = server
            .post("/events/unregister")
            .add_cookie(olu)
            .form(&[("event_schedule_id", schedule_id.as_str()), ("participant_id", own_id.as_str())])
            .await;
        assert_redirect(&denied, "/");
        assert_eq!(registration::Entity::find().count(&state.db).await.unwrap(), 1);

        let removed = server
            .post("/events/unregister")
            .add_cookie(alice)
            .form(&[("event_schedule_id", schedule_id.as_str())])
            .await;
        assert_redirect(&removed, "/events");
        assert_eq!(registration::Entity::find().count(&state.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_milestone_mutations_follow_ownership() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "alice", user::UserLevel::User, false).await;
        seed_user(&state.db, "olu", user::UserLevel::User, false).await;
        let own = seed_participant(&state.db, "Alice", Some("alice")).await;
        let alice = login(&server, "alice").await;
        let view_path = format!("/milestones/view/{}", own.id);

        let added = server
            .post(&format!("/milestones/add/{}", own.id))
            .add_cookie(alice.clone())
            .form(&[("title", "First robot"), ("milestone_date", "2025-03-01")])
            .await;
        assert_redirect(&added, &view_path);
        let saved = milestone::Entity::find().one(&state.db).await.unwrap().unwrap();
        let edit_path = format!("/milestones/edit/{}", saved.id);

        let olu = login(&server, "olu").await;
        assert_redirect(
            &get_with(&server, &format!("/milestones/add/{}", own.id), &olu).await,
            "/",
        );
        assert_redirect(&get_with(&server, &edit_path, &olu).await, "/");
        let denied = server
            .post(&edit_path)
            .add_cookie(olu.clone())
            .form(&[("title", "Hijacked"), ("milestone_date", "2025-03-02")])
            .await;
        assert_redirect(&denied, "/");
        let denied_delete = server
            .post(&format!("/milestones/delete/{}", saved.id))
            .add_cookie(olu)
            .await;
        assert_redirect(&denied_delete, "/");
        let unchanged = milestone::Entity::find_by_id(saved.id).one(&state.db).await.unwrap().unwrap();
        assert_eq!(unchanged.title, "First robot");

        let edited = server
            .post(&edit_path)
            .add_cookie(alice.clone())
            .form(&[("title", "Regional finals"), ("milestone_date", "2025-04-01")])
            .await;
        assert_redirect(&edited, &view_path);
        let updated = milestone::Entity::find_by_id(saved.id).one(&state.db).await.unwrap().unwrap();
        assert_eq!(updated.title, "Regional finals");

        let deleted = server
            .post(&format!("/milestones/delete/{}", saved.id))
            .add_cookie(alice)
            .await;
        assert_redirect(&deleted, &view_path);
        assert_eq!(milestone::Entity::find().count(&state.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_manager_adds_event_and_donation() {
        let (server, state) = setup_test_server().await;
        seed_user(&state.db, "director", user::UserLevel::Manager, false).await;
        let donor = seed_participant(&state.db, "Dana", None).await;
        let cookie = login(&server, "director").await;

        let event = server
            .post("/events/add")
            .add_cookie(cookie.clone())
            .form(&[
                ("name", "Robotics Night"),
                ("event_type", "Workshop"),
                ("location", "Gym"),
                ("start_time", "2030-02-01T18:00"),
                ("end_time", "2030-02-01T20:00"),
                ("capacity", "15"),
            ])
            .await;
        assert_redirect(&event, "/events");
        let created = event::Entity::find().one(&state.db).await.unwrap().unwrap();
        assert_eq!(created.name, "Robotics Night");
        assert_eq!(event_schedule::Entity::find().count(&state.db).await.unwrap(), 1);

        let donor_id = donor.id.to_string();
        let donation = server
            .post("/admin/donations/add")
            .add_cookie(cookie)
            .form(&[
                ("participant_id", donor_id.as_str()),
                ("amount", "1234.5678"),
                ("donation_date", "2030-02-01"),
            ])
            .await;
        assert_redirect(&donation, "/admin/donations");
        let saved = donation::Entity::find().one(&state.db).await.unwrap().unwrap();
        assert_eq!(saved.participant_id, donor.id);
        assert_eq!(saved.amount, rust_decimal::Decimal::new(123457, 2));
    }
}
