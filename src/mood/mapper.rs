use crate::error::{MoodError, MoodResult};
use crate::mood::types::{Expression, ExpressionScore, ExpressionVector, Mood, MoodReading};

/// Fixed many-to-one lookup from classifier expression to mood.
/// Unrecognized labels fall back to `Relaxed`.
pub fn mood_for_expression(expression: Expression) -> Mood {
    match expression {
        Expression::Happy | Expression::Surprised => Mood::Happy,
        Expression::Sad | Expression::Fearful | Expression::Disgusted => Mood::Sad,
        Expression::Angry => Mood::Motivated,
        Expression::Neutral | Expression::Unknown => Mood::Relaxed,
    }
}

/// Picks the dominant expression and returns its mood with the dominant
/// probability as confidence. Ties go to the earliest entry.
pub fn map(vector: &ExpressionVector) -> MoodResult<MoodReading> {
    let dominant = vector
        .scores()
        .iter()
        .fold(None, |best: Option<&ExpressionScore>, score| match best {
            Some(current) if current.probability >= score.probability => Some(current),
            _ => Some(score),
        })
        .ok_or_else(|| MoodError::invalid_input("expression vector is empty"))?;

    Ok(MoodReading {
        mood: mood_for_expression(dominant.expression),
        confidence: dominant.probability,
        dominant: dominant.expression,
    })
}
