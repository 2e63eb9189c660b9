use chrono::Utc;

use crate::actor_framework::Entity;
use crate::domain::comment::{validate_images, validate_note};
use crate::domain::{Comment, CommentCreate, CommentPatch};

impl Entity for Comment {
    type Id = String;
    type CreateParams = CommentCreate;
    type Patch = CommentPatch;
    type Action = ();
    type ActionResult = ();

    const TABLE: &'static str = "commentaires";

    fn id(&self) -> &String {
        &self.id
    }

    fn from_create_params(id: String, params: CommentCreate) -> Result<Self, String> {
        params.validate()?;
        Ok(Self {
            id,
            produit_id: params.produit_id,
            nom: params.nom.trim().to_string(),
            email: params.email,
            commentaire: params.commentaire.trim().to_string(),
            note: params.note,
            images: params.images,
            approuve: false,
            created_at: Utc::now(),
        })
    }

    /// Applies an edit. Every field is validated before any is written.
    fn on_update(&mut self, patch: CommentPatch) -> Result<(), String> {
        if let Some(text) = &patch.commentaire {
            if text.trim().is_empty() {
                return Err("commentaire requis".to_string());
            }
        }
        if let Some(note) = patch.note {
            validate_note(note)?;
        }
        if let Some(images) = &patch.images {
            validate_images(images)?;
        }

        if let Some(text) = patch.commentaire {
            self.commentaire = text.trim().to_string();
        }
        if let Some(note) = patch.note {
            self.note = note;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(approuve) = patch.approuve {
            self.approuve = approuve;
        }
        Ok(())
    }

    fn handle_action(&mut self, _action: ()) -> Result<(), String> {
        Ok(())
    }
}
