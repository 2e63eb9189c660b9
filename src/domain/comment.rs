use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_COMMENT_IMAGES: usize = 5;

/// A customer review of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub produit_id: String,
    pub nom: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub commentaire: String,
    pub note: u8,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub approuve: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for posting a comment. Images are public URLs returned by the
/// storage upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreate {
    pub produit_id: String,
    pub nom: String,
    pub email: Option<String>,
    pub commentaire: String,
    pub note: u8,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentPatch {
    pub commentaire: Option<String>,
    pub note: Option<u8>,
    pub images: Option<Vec<String>>,
    pub approuve: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub count: usize,
    pub average: f64,
}

impl RatingSummary {
    pub fn from_notes(notes: impl IntoIterator<Item = u8>) -> Self {
        let (count, sum) = notes
            .into_iter()
            .fold((0usize, 0u32), |(c, s), n| (c + 1, s + u32::from(n)));
        let average = if count == 0 { 0.0 } else { f64::from(sum) / count as f64 };
        Self { count, average }
    }
}

pub(crate) fn validate_note(note: u8) -> Result<(), String> {
    if (1..=5).contains(&note) {
        Ok(())
    } else {
        Err(format!("note hors limites: {}", note))
    }
}

pub(crate) fn validate_images(images: &[String]) -> Result<(), String> {
    if images.len() > MAX_COMMENT_IMAGES {
        return Err(format!("trop d'images: {} (max {})", images.len(), MAX_COMMENT_IMAGES));
    }
    if images.iter().any(|url| url.trim().is_empty()) {
        return Err("url d'image vide".to_string());
    }
    Ok(())
}

impl CommentCreate {
    pub fn validate(&self) -> Result<(), String> {
        if self.nom.trim().is_empty() {
            return Err("nom requis".to_string());
        }
        if self.commentaire.trim().is_empty() {
            return Err("commentaire requis".to_string());
        }
        validate_note(self.note)?;
        validate_images(&self.images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_summary_average() {
        let s = RatingSummary::from_notes([5, 4, 3]);
        assert_eq!(s.count, 3);
        assert!((s.average - 4.0).abs() < f64::EPSILON);
        assert_eq!(RatingSummary::from_notes([]).average, 0.0);
    }

    #[test]
    fn create_validation() {
        let mut c = CommentCreate {
            produit_id: "p1".into(),
            nom: "Karim".into(),
            email: None,
            commentaire: "Très belle qualité".into(),
            note: 5,
            images: vec![],
        };
        assert!(c.validate().is_ok());
        c.note = 0;
        assert!(c.validate().is_err());
        c.note = 4;
        c.images = vec!["https://cdn/x.jpg".into(); 6];
        assert!(c.validate().is_err());
        c.images.clear();
        c.commentaire = "   ".into();
        assert!(c.validate().is_err());
    }
}
