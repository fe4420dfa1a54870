//! A scripted estimation round.
//!
//! Three participants join, play their cards, reveal, and reset. Every
//! update published on the session's channel is printed as JSON, followed
//! by a one-line summary once the cards are revealed.
//!
//! Run with `RUST_LOG=debug` to see the engine's own logging.

use std::time::Duration;

use cardroom::prelude::*;

// ---------------------------------------------------------------------------
// Round summary
// ---------------------------------------------------------------------------

/// What the group decided, once cards are face up.
#[derive(Debug, PartialEq)]
struct Summary {
    voted: usize,
    waiting: usize,
    /// Mean of the numeric cards. `?` and other non-numeric cards are left out.
    mean: Option<f64>,
    unanimous: bool,
}

fn summarize(update: &Update) -> Option<Summary> {
    if !update.revealed {
        return None;
    }
    let played: Vec<&str> = update
        .participants
        .iter()
        .filter(|p| p.has_selected())
        .map(|p| p.selection.as_str())
        .collect();
    let numeric: Vec<f64> = played.iter().filter_map(|s| s.parse().ok()).collect();
    let mean = (!numeric.is_empty()).then(|| numeric.iter().sum::<f64>() / numeric.len() as f64);

    Some(Summary {
        voted: played.len(),
        waiting: update.participants.len() - played.len(),
        mean,
        unanimous: !played.is_empty() && played.iter().all(|s| *s == played[0]),
    })
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), CardroomError> {
    let config = CardroomConfig::from_json_str(r#"{"evictor": {"interval_secs": 5}}"#)?;
    cardroom::logging::init(&config.logging)?;

    let cardroom = Cardroom::builder().config(config).build();
    let session = cardroom.create_session("Sprint 42 grooming").await;
    let sid = session.id.clone();
    let mut updates = cardroom.subscribe(&sid);

    let printer = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            match serde_json::to_string(&update) {
                Ok(json) => println!("{json}"),
                Err(err) => tracing::warn!(error = %err, "could not print update"),
            }
            if let Some(summary) = summarize(&update) {
                println!("  -> {summary:?}");
            }
        }
    });

    let team = [("ana", "Ana", "5"), ("bo", "Bo", "8"), ("cy", "Cy", "?")];
    for (id, name, _) in team {
        cardroom
            .dispatch(Action::join(sid.clone(), Some(ParticipantId::from(id)), name))
            .await;
    }
    for (id, _, card) in team {
        cardroom
            .dispatch(Action::vote(sid.clone(), ParticipantId::from(id), card))
            .await;
    }
    cardroom.dispatch(Action::reveal(sid.clone())).await;
    cardroom.dispatch(Action::reset(sid.clone())).await;

    // Everyone leaves; the last departure removes the session and closes
    // the channel, which ends the printer.
    for (id, _, _) in team {
        cardroom
            .dispatch(Action::leave(sid.clone(), ParticipantId::from(id)))
            .await;
    }

    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        tracing::warn!("printer did not finish");
    }
    tracing::info!(exists = cardroom.session_name(&sid).await.is_some(), "round over");
    cardroom.shutdown().await;
    Ok(())
}
