mod processor;

pub use processor::{
    chunk_text, clean_text, is_pdf_filename, locate_entities, ChunkConfig, DocumentProcessor,
    EntityCandidate, PdfExtractor, TextExtractor,
};
