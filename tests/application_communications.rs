use apply_orchestrator::models::{ApplicationPriority, ApplicationSource, CommunicationDirection};
use apply_orchestrator::persistence::jobs::NewJobPosting;
use apply_orchestrator::persistence::{ApplicationsRepo, JobsRepo};
use apply_orchestrator::test_support::TestDatabase;
use uuid::Uuid;

/// §8: "`AddCommunication` with the same `(message_id, application_id)`
/// twice appends once." A re-probed inbound email carries the same
/// provider message id on every pass, so the append must be idempotent.
#[tokio::test]
async fn add_communication_twice_with_same_message_id_appends_once() {
    let test_db = match TestDatabase::new().await {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping test: could not provision test database: {err}");
            return;
        }
    };
    let pool = test_db.pool_clone();

    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email) VALUES ($1) RETURNING id",
    )
    .bind("candidate@example.test")
    .fetch_one(&pool)
    .await
    .expect("user insert succeeds");

    let jobs = JobsRepo::new(pool.clone());
    let job = jobs
        .create(NewJobPosting {
            title: "Backend Engineer",
            description: "Build things",
            company: "Acme",
            location: None,
            employment_type: None,
            arrangement: None,
            level: None,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            salary_period: None,
            salary_negotiable: false,
            skills_required: &[],
            skills_preferred: &[],
            requirements: &[],
            application_email: Some("jobs@acme.test"),
            application_url: None,
            source: "direct",
            posted_at: None,
        })
        .await
        .expect("job insert succeeds");

    let applications = ApplicationsRepo::new(pool.clone());
    let application = applications
        .create(
            user_id,
            job.id,
            &job.title,
            &job.company,
            None,
            ApplicationSource::AutoApply,
            ApplicationPriority::Medium,
        )
        .await
        .expect("application insert succeeds");

    let communication = apply_orchestrator::models::Communication {
        id: Uuid::new_v4(),
        direction: CommunicationDirection::Inbound,
        channel: "email".to_string(),
        subject: Some("Interview invitation".to_string()),
        snippet: Some("snippet".to_string()),
        provider_message_id: Some("provider-msg-1".to_string()),
        category: Some("InterviewInvitation".to_string()),
        confidence: Some(0.8),
        occurred_at: chrono::Utc::now(),
    };
    let event = apply_orchestrator::models::TimelineEvent::note("communication", "inbound email");

    let after_first = applications
        .push_communication(application.id, communication.clone(), event.clone())
        .await
        .expect("first push succeeds");
    assert_eq!(after_first.communications.len(), 1);

    // Simulate a second probe finding the same message again.
    let after_second = applications
        .push_communication(application.id, communication, event)
        .await
        .expect("second push succeeds");
    assert_eq!(
        after_second.communications.len(),
        1,
        "re-probing the same provider message id must not duplicate the communication"
    );
}
