#[cfg(test)]
mod tests {
    use crate::genome::{Chromosome, GenomeStructure, write_raw_sequence};
    use std::io::Cursor;

    const TWO_CHROM_FASTA: &str = ">chr1 primary assembly\nACGTACGT\n>chr2\nAAA\nAA\n";

    #[test]
    fn test_from_fasta() {
        let gs = GenomeStructure::from_fasta(Cursor::new(TWO_CHROM_FASTA)).unwrap();
        let chroms = gs.chromosomes();
        assert_eq!(chroms.len(), 2);
        assert_eq!(chroms[0].name, "chr1");
        assert_eq!(chroms[0].length, 8);
        assert_eq!(chroms[1].name, "chr2");
        assert_eq!(chroms[1].length, 5);
        assert_eq!(gs.total_length(), 13);
    }

    #[test]
    fn test_from_fasta_empty() {
        let gs = GenomeStructure::from_fasta(Cursor::new("")).unwrap();
        assert!(gs.is_empty());
        assert_eq!(gs.total_length(), 0);
    }

    #[test]
    fn test_from_fasta_rejects_non_fasta() {
        assert!(GenomeStructure::from_fasta(Cursor::new("ACGTACGT\n")).is_err());
    }

    #[test]
    fn test_resolve_absolute() {
        let gs = GenomeStructure::new(vec![
            Chromosome {
                name: "chr1".into(),
                length: 8,
            },
            Chromosome {
                name: "chr2".into(),
                length: 5,
            },
        ]);

        let c = gs.resolve_absolute(0).unwrap();
        assert_eq!(c.chromosome.name, "chr1");
        assert_eq!(c.offset, 0);

        let c = gs.resolve_absolute(7).unwrap();
        assert_eq!(c.chromosome.name, "chr1");
        assert_eq!(c.offset, 7);

        let c = gs.resolve_absolute(8).unwrap();
        assert_eq!(c.chromosome.name, "chr2");
        assert_eq!(c.offset, 0);

        let c = gs.resolve_absolute(12).unwrap();
        assert_eq!(c.chromosome.name, "chr2");
        assert_eq!(c.offset, 4);

        assert!(gs.resolve_absolute(13).is_err());
    }

    #[test]
    fn test_resolve_prefix_sum_identity() {
        let gs = GenomeStructure::new(vec![
            Chromosome {
                name: "a".into(),
                length: 3,
            },
            Chromosome {
                name: "b".into(),
                length: 1,
            },
            Chromosome {
                name: "c".into(),
                length: 6,
            },
        ]);
        let mut start = 0u64;
        let mut starts = std::collections::HashMap::new();
        for c in gs.chromosomes() {
            starts.insert(c.name.clone(), start);
            start += c.length;
        }
        for p in 0..gs.total_length() {
            let c = gs.resolve_absolute(p).unwrap();
            assert_eq!(starts[&c.chromosome.name] + c.offset, p);
            assert!(c.offset < c.chromosome.length);
        }
    }

    #[test]
    fn test_serialize_round_trip() {
        let dir = std::path::PathBuf::from("target/test_genome_roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("structure.gs");

        let gs = GenomeStructure::from_fasta(Cursor::new(TWO_CHROM_FASTA)).unwrap();
        gs.write_to(&path).unwrap();
        let restored = GenomeStructure::read_from(&path).unwrap();
        assert_eq!(gs, restored);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_raw_sequence() {
        let mut out = Vec::new();
        let n = write_raw_sequence(Cursor::new(">c1\nacGT\n>c2\nnnA\n"), &mut out).unwrap();
        assert_eq!(out, b"ACGTNNA");
        assert_eq!(n, 7);
    }

    #[test]
    fn test_write_raw_sequence_rejects_garbage() {
        let mut out = Vec::new();
        assert!(write_raw_sequence(Cursor::new(">c1\nAC1T\n"), &mut out).is_err());
    }
}
