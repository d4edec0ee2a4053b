// Initial operations that bring an existing melody into the graph.

use std::path::Path;

use tracing::info;

use crate::error::OperationError;
use crate::library::{MelodyId, MelodyLibrary};
use crate::melody::Melody;
use crate::midi;

/// Import the first note-bearing track of a MIDI file.
pub fn from_midi(path: &Path) -> Result<Melody, OperationError> {
    let melody = midi::read_midi(path)?;
    info!(path = %path.display(), notes = melody.length(), "imported MIDI");
    Ok(melody)
}

/// Load a saved melody. Fails when no library is attached or the id is
/// unknown.
pub fn from_library(
    library: Option<&dyn MelodyLibrary>,
    id: MelodyId,
) -> Result<Melody, OperationError> {
    let library = library.ok_or(OperationError::LibraryUnavailable)?;
    library.load(id)?.ok_or(OperationError::MelodyNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::InMemoryLibrary;
    use crate::melody::tests::{n, r};
    use crate::midi::{MidiExportOptions, write_midi};

    #[test]
    fn library_lookup() {
        let melody = Melody::from_events(vec![n("C4", 1, 1), r(1, 1)]);
        let mut library = InMemoryLibrary::new();
        let id = library.insert("motif", &melody).unwrap();

        assert_eq!(from_library(Some(&library), id).unwrap(), melody);
        assert!(matches!(
            from_library(Some(&library), MelodyId(77)),
            Err(OperationError::MelodyNotFound(MelodyId(77)))
        ));
        assert!(matches!(
            from_library(None, id),
            Err(OperationError::LibraryUnavailable)
        ));
    }

    #[test]
    fn midi_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mid");
        let melody = Melody::from_events(vec![n("E4", 1, 2), n("G4", 1, 2)]);
        write_midi(&melody, &path, &MidiExportOptions::default()).unwrap();
        assert_eq!(from_midi(&path).unwrap(), melody);

        assert!(matches!(
            from_midi(&dir.path().join("missing.mid")),
            Err(OperationError::Music(_))
        ));
    }
}
