#[cfg(test)]
mod tests {
    use crate::genome::{Chromosome, GenomeStructure};
    use crate::kmers::{Kmer, Strand};
    use crate::record::{format_record, write_header, OffTarget};

    fn sample_structure() -> GenomeStructure {
        GenomeStructure::new(vec![
            Chromosome {
                name: "chr1".into(),
                length: 8,
            },
            Chromosome {
                name: "chr2".into(),
                length: 5,
            },
        ])
    }

    #[test]
    fn test_header() {
        let gs = sample_structure();
        let mut out = Vec::new();
        write_header(&mut out, &gs).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "@HD\tVN:1.0\tSO:unsorted");
        assert_eq!(lines[1], "@SQ\tSN:chr1\tLN:8");
        assert_eq!(lines[2], "@SQ\tSN:chr2\tLN:5");
        assert!(lines[3].starts_with("@PG\tID:guidedb"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_format_record() {
        let gs = sample_structure();
        let kmer = Kmer {
            sequence: "GAA".into(),
            pam: "AGG".into(),
            absolute_coords: 8,
            strand: Strand::Forward,
        };
        let coords = gs.resolve_absolute(8).unwrap();
        let table = vec![
            vec![
                OffTarget {
                    position: 8,
                    strand: Strand::Forward,
                },
                OffTarget {
                    position: 3,
                    strand: Strand::Reverse,
                },
            ],
            Vec::new(),
            vec![OffTarget {
                position: 11,
                strand: Strand::Forward,
            }],
        ];
        let line = format_record(&kmer, &coords, &table);
        assert_eq!(
            line,
            "chr2:0:+\t0\tchr2\t1\t255\t3M\t*\t0\t0\tGAA\t*\tpm:Z:AGG\tof:Z:0:8,-3;2:11"
        );
    }

    #[test]
    fn test_format_record_antisense_zero_keeps_sign() {
        let gs = sample_structure();
        let kmer = Kmer {
            sequence: String::new(),
            pam: "TGG".into(),
            absolute_coords: 0,
            strand: Strand::Reverse,
        };
        let coords = gs.resolve_absolute(0).unwrap();
        let table = vec![vec![OffTarget {
            position: 0,
            strand: Strand::Reverse,
        }]];
        let line = format_record(&kmer, &coords, &table);
        assert_eq!(
            line,
            "chr1:0:-\t16\tchr1\t1\t255\t*\t*\t0\t0\t*\t*\tpm:Z:TGG\tof:Z:0:-0"
        );
    }

    #[test]
    fn test_format_record_empty_table() {
        let gs = sample_structure();
        let kmer = Kmer {
            sequence: "ACG".into(),
            pam: "AGG".into(),
            absolute_coords: 1,
            strand: Strand::Forward,
        };
        let coords = gs.resolve_absolute(1).unwrap();
        let line = format_record(&kmer, &coords, &vec![Vec::new()]);
        assert!(line.ends_with("of:Z:."));
    }
}
