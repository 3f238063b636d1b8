use crate::interactions::GenreId;
use anyhow::{bail, Result};
use serde::Serialize;

/// Reserved id the catalog uses for its global, genre-less chart.
pub const ALL_GENRES: GenreId = 0;

pub const DEFAULT_TAXONOMY: &[(GenreId, &str)] = &[
    (132, "Pop"),
    (116, "Rap/Hip Hop"),
    (152, "Rock"),
    (113, "Dance"),
    (165, "R&B"),
    (85, "Alternative"),
    (106, "Electro"),
    (129, "Jazz"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

/// The closed list of genres feeds are sampled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreTaxonomy {
    genres: Vec<Genre>,
}

impl Default for GenreTaxonomy {
    fn default() -> Self {
        Self {
            genres: DEFAULT_TAXONOMY
                .iter()
                .map(|(id, name)| Genre {
                    id: *id,
                    name: name.to_string(),
                })
                .collect(),
        }
    }
}

impl GenreTaxonomy {
    /// Builds a taxonomy out of genre ids. Known ids get their catalog name,
    /// others a generic one.
    pub fn from_ids(ids: &[GenreId]) -> Result<Self> {
        if ids.is_empty() {
            bail!("The genre taxonomy cannot be empty");
        }
        let mut genres: Vec<Genre> = Vec::with_capacity(ids.len());
        for id in ids {
            if *id == ALL_GENRES {
                bail!("Genre id {} is reserved", ALL_GENRES);
            }
            if genres.iter().any(|g| g.id == *id) {
                bail!("Genre id {} is listed twice", id);
            }
            let name = DEFAULT_TAXONOMY
                .iter()
                .find(|(known_id, _)| known_id == id)
                .map(|(_, name)| name.to_string())
                .unwrap_or_else(|| format!("Genre {}", id));
            genres.push(Genre { id: *id, name });
        }
        Ok(Self { genres })
    }

    pub fn genres(&self) -> &[Genre] {
        &self.genres
    }

    pub fn ids(&self) -> Vec<GenreId> {
        self.genres.iter().map(|g| g.id).collect()
    }

    pub fn contains(&self, id: GenreId) -> bool {
        self.genres.iter().any(|g| g.id == id)
    }
}
