pub mod ccd; // C-CDA XML → MedicalRecord
pub mod checkpoint; // Markdown export/import of one member's graph
pub mod graph; // MedicalRecord → ordered merge operations
pub mod intake; // Size ceiling + format sniffing for CLI inputs
pub mod narrative; // Markdown/plain-text reports → MedicalRecord
