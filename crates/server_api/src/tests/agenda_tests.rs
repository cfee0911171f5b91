use super::*;
use chrono::TimeZone;
use storage::Storage;

async fn setup() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext { storage }
}

async fn backdate_start(ctx: &ApiContext, agenda_id: AgendaId, minutes: i64) {
    sqlx::query("UPDATE agendas SET start_time = ? WHERE id = ?")
        .bind(Utc::now() - Duration::minutes(minutes))
        .bind(agenda_id.0)
        .execute(ctx.storage.pool())
        .await
        .expect("backdate start_time");
}

#[tokio::test]
async fn create_defaults_non_positive_duration_to_one_minute() {
    let ctx = setup().await;

    let zero = create_agenda(&ctx, "Budget", 0).await.expect("create");
    assert_eq!(zero.duration_minutes, 1);

    let negative = create_agenda(&ctx, "Bylaws", -5).await.expect("create");
    assert_eq!(negative.duration_minutes, 1);
}

#[tokio::test]
async fn create_keeps_positive_duration() {
    let ctx = setup().await;
    let agenda = create_agenda(&ctx, "Budget", 45).await.expect("create");
    assert_eq!(agenda.duration_minutes, 45);

    let stored = ctx
        .storage
        .find_agenda(agenda.agenda_id)
        .await
        .expect("find")
        .expect("agenda exists");
    assert_eq!(stored.duration_minutes, 45);
}

#[tokio::test]
async fn create_with_taken_name_fails_with_agenda_already_exists() {
    let ctx = setup().await;
    let first = create_agenda(&ctx, "Budget", 5).await.expect("create");

    let err = create_agenda(&ctx, "Budget", 3)
        .await
        .expect_err("duplicate name must fail");
    assert!(matches!(err.code, ErrorCode::AgendaAlreadyExists));

    let kept = ctx
        .storage
        .find_agenda(first.agenda_id)
        .await
        .expect("find")
        .expect("agenda exists");
    assert_eq!(kept.duration_minutes, 5);
}

#[tokio::test]
async fn open_unknown_agenda_fails_with_not_found() {
    let ctx = setup().await;
    let err = open_agenda(&ctx, AgendaId(404))
        .await
        .expect_err("missing agenda must fail");
    assert!(matches!(err.code, ErrorCode::AgendaNotFound));
}

#[tokio::test]
async fn open_stamps_start_time_with_now() {
    let ctx = setup().await;
    let agenda = create_agenda(&ctx, "Budget", 5).await.expect("create");

    let before = Utc::now();
    open_agenda(&ctx, agenda.agenda_id).await.expect("open");
    let after = Utc::now();

    let stored = ctx
        .storage
        .find_agenda(agenda.agenda_id)
        .await
        .expect("find")
        .expect("agenda exists");
    let start = stored.start_time.expect("start time set");
    assert!(start >= before && start <= after);

    let result = get_agenda(&ctx, agenda.agenda_id).await.expect("get");
    assert!(result.is_open);
    assert_eq!(result.positive_votes, 0);
    assert_eq!(result.negative_votes, 0);
}

#[tokio::test]
async fn immediate_reopen_fails_with_already_open() {
    let ctx = setup().await;
    let agenda = create_agenda(&ctx, "Budget", 5).await.expect("create");
    open_agenda(&ctx, agenda.agenda_id).await.expect("open");

    let err = open_agenda(&ctx, agenda.agenda_id)
        .await
        .expect_err("second open must fail");
    assert!(matches!(err.code, ErrorCode::AgendaAlreadyOpen));
}

#[tokio::test]
async fn open_after_elapsed_window_fails_with_already_closed() {
    let ctx = setup().await;
    let agenda = create_agenda(&ctx, "Budget", 1).await.expect("create");
    open_agenda(&ctx, agenda.agenda_id).await.expect("open");
    backdate_start(&ctx, agenda.agenda_id, 2).await;

    let err = open_agenda(&ctx, agenda.agenda_id)
        .await
        .expect_err("reopen after window must fail");
    assert!(matches!(err.code, ErrorCode::AgendaAlreadyClosed));
}

#[tokio::test]
async fn concurrent_opens_transition_exactly_once() {
    let ctx = setup().await;
    let agenda = create_agenda(&ctx, "Budget", 5).await.expect("create");

    let ctx_a = ctx.clone();
    let ctx_b = ctx.clone();
    let agenda_id = agenda.agenda_id;
    let (left, right) = tokio::join!(
        async move { open_agenda(&ctx_a, agenda_id).await },
        async move { open_agenda(&ctx_b, agenda_id).await }
    );

    let opened = [left, right].iter().filter(|result| result.is_ok()).count();
    assert_eq!(opened, 1, "exactly one open should perform the transition");
}

#[tokio::test]
async fn get_unknown_agenda_fails_with_not_found() {
    let ctx = setup().await;
    let err = get_agenda(&ctx, AgendaId(404))
        .await
        .expect_err("missing agenda must fail");
    assert!(matches!(err.code, ErrorCode::AgendaNotFound));
}

#[test]
fn unstarted_agenda_is_never_open() {
    let agenda = StoredAgenda {
        agenda_id: AgendaId(1),
        name: "Budget".to_string(),
        duration_minutes: 5,
        start_time: None,
    };
    assert!(!agenda_is_open(&agenda, Utc::now()));
}

#[test]
fn voting_window_is_half_open() {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let agenda = StoredAgenda {
        agenda_id: AgendaId(1),
        name: "Budget".to_string(),
        duration_minutes: 10,
        start_time: Some(start),
    };

    assert!(agenda_is_open(&agenda, start));
    assert!(agenda_is_open(&agenda, start + Duration::minutes(9)));
    assert!(!agenda_is_open(&agenda, start + Duration::minutes(10)));
    assert!(!agenda_is_open(&agenda, start + Duration::minutes(11)));
}
