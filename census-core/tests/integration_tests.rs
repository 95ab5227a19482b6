//! End-to-end pipeline tests.
//!
//! Each test builds a small study (in memory or as a PLINK fileset in a
//! temporary directory) and drives it through QA, census, Hardy-Weinberg
//! and association, checking the stored datasets along the way.

use std::io::Write;
use std::path::{Path, PathBuf};

use census_core::association::{
    run_association, AssociationEntry, AssociationReader, AssociationRequest, AssociationTest,
};
use census_core::census::{
    run_census, CensusCategory, CensusEntry, CensusReader, CensusRequest, CensusThresholds,
};
use census_core::hardy_weinberg::{run_hardy_weinberg, HardyWeinbergEntry, HardyWeinbergReader};
use census_core::qa::{
    run_qa_markers, run_qa_samples, QaMarkersEntry, QaMarkersReader, QaSamplesEntry,
    QaSamplesReader,
};
use census_core::store::EntryRange;
use census_core::{
    OperationKind, OperationStore, PipelineConfig, PipelineContext, PipelineOutcome, StudySource,
};
use census_geno::memory::MemoryMatrix;
use census_geno::{
    Affection, Genotype, GenotypeMatrix, MarkerInfo, SampleInfo, SampleKey, SampleRegistry, Sex,
};

fn permissive() -> CensusThresholds {
    CensusThresholds {
        marker_missing_ratio_max: 1.0,
        sample_missing_ratio_max: 1.0,
        sample_heterozygosity_ratio_max: 1.0,
        discard_mismatches: true,
    }
}

fn memory_source(
    samples: &[(&str, Sex, Affection)],
    markers: Vec<MarkerInfo>,
    genotypes: Vec<Vec<Genotype>>,
) -> StudySource {
    let ids = samples.iter().map(|s| s.0.to_string()).collect();
    let matrix = MemoryMatrix::from_markers(ids, markers, genotypes).unwrap();
    let registry = SampleRegistry::from_samples(
        samples
            .iter()
            .map(|&(id, sex, aff)| SampleInfo::new(id, sex, aff)),
    );
    StudySource::new("study", Box::new(matrix), registry)
}

/// Run both QA pipelines and return their keys.
fn run_qa(source: &mut StudySource, ctx: &PipelineContext) -> (String, String) {
    let markers = run_qa_markers(source, ctx).unwrap();
    let samples = run_qa_samples(source, ctx).unwrap();
    (
        markers.key().unwrap().to_string(),
        samples.key().unwrap().to_string(),
    )
}

fn census_entries(store: &OperationStore, key: &str) -> Vec<CensusEntry> {
    store
        .open::<CensusEntry>(key)
        .unwrap()
        .get_entries(EntryRange::ALL)
        .unwrap()
}

mod scenarios {
    use super::*;

    #[test]
    fn test_affected_males_and_missing_female() {
        let mut source = memory_source(
            &[
                ("M1", Sex::Male, Affection::Affected),
                ("M2", Sex::Male, Affection::Affected),
                ("F1", Sex::Female, Affection::Unaffected),
            ],
            vec![MarkerInfo::new("1", 1000, "rs1")],
            vec![vec![*b"AA", *b"AG", *b"00"]],
        );
        let store = OperationStore::in_memory();
        let ctx = PipelineContext::new(&store);
        let (qa_markers, qa_samples) = run_qa(&mut source, &ctx);

        let qa = store.open::<QaMarkersEntry>(&qa_markers).unwrap();
        let missing = qa.missing_ratios().unwrap();
        assert!((missing[0] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(qa.known_alleles().unwrap(), vec![(b'A', b'G')]);

        let request = CensusRequest::new(&qa_markers, &qa_samples).with_thresholds(permissive());
        let outcome = run_census(&mut source, &request, &ctx).unwrap();
        let entries = census_entries(&store, outcome.key().unwrap());
        assert_eq!(entries.len(), 1);

        let c = &entries[0].census;
        assert_eq!(
            (c.all.hom_major, c.all.het, c.all.hom_minor, c.all.missing),
            (1, 1, 0, Some(1))
        );
        assert_eq!((c.case.hom_major, c.case.het, c.case.hom_minor), (1, 1, 0));
        assert_eq!(c.control.called(), 0);
        assert_eq!(c.alternate.called(), 0);
        assert_eq!((entries[0].major, entries[0].minor), (b'A', b'G'));
    }

    #[test]
    fn test_female_on_y_is_not_missing() {
        let mut source = memory_source(
            &[
                ("M1", Sex::Male, Affection::Affected),
                ("M2", Sex::Male, Affection::Unaffected),
                ("F1", Sex::Female, Affection::Unaffected),
            ],
            vec![MarkerInfo::new("Y", 2_650_000, "rsY")],
            vec![vec![*b"TT", *b"TT", *b"00"]],
        );
        let store = OperationStore::in_memory();
        let ctx = PipelineContext::new(&store);
        let (qa_markers, qa_samples) = run_qa(&mut source, &ctx);

        let qa = store.open::<QaMarkersEntry>(&qa_markers).unwrap();
        assert_eq!(qa.missing_ratios().unwrap(), vec![0.0]);
        let samples = store.open::<QaSamplesEntry>(&qa_samples).unwrap();
        assert_eq!(samples.missing_ratios().unwrap(), vec![0.0, 0.0, 0.0]);

        // default thresholds keep everything here
        let request = CensusRequest::new(&qa_markers, &qa_samples);
        let outcome = run_census(&mut source, &request, &ctx).unwrap();
        let entries = census_entries(&store, outcome.key().unwrap());
        let all = entries[0].census.all;
        assert_eq!(all.missing, Some(0));
        assert_eq!(all.hom_major, 2);
        assert_eq!(all.total(), 2);
        assert_eq!(entries[0].census.alternate.called(), 0);
    }

    #[test]
    fn test_thresholds_excluding_all_samples() {
        let mut source = memory_source(
            &[
                ("S1", Sex::Female, Affection::Affected),
                ("S2", Sex::Male, Affection::Unaffected),
                ("S3", Sex::Female, Affection::Unaffected),
            ],
            vec![
                MarkerInfo::new("1", 10, "rs1"),
                MarkerInfo::new("1", 20, "rs2"),
                MarkerInfo::new("2", 30, "rs3"),
            ],
            vec![
                vec![*b"00", *b"CC", *b"CT"],
                vec![*b"GG", *b"00", *b"GG"],
                vec![*b"AC", *b"AA", *b"00"],
            ],
        );
        let store = OperationStore::in_memory();
        let ctx = PipelineContext::new(&store);
        let (qa_markers, qa_samples) = run_qa(&mut source, &ctx);

        let thresholds = CensusThresholds {
            sample_missing_ratio_max: 0.0,
            ..permissive()
        };
        let request = CensusRequest::new(&qa_markers, &qa_samples).with_thresholds(thresholds);
        let outcome = run_census(&mut source, &request, &ctx).unwrap();
        assert_eq!(outcome, PipelineOutcome::NoDataRemaining);
        assert!(store.list_kind(OperationKind::MarkerCensus).unwrap().is_empty());

        // the matrix view is left unsubsetted
        assert_eq!(source.matrix.n_samples(), 3);
    }
}

mod memory_chain {
    use super::*;

    const BASES: [u8; 2] = [b'A', b'G'];

    /// 40 samples: the first 20 affected, alternating sex.
    fn study(n_markers: usize) -> StudySource {
        let samples: Vec<(String, Sex, Affection)> = (0..40)
            .map(|i| {
                let sex = if i % 2 == 0 { Sex::Male } else { Sex::Female };
                let aff = if i < 20 {
                    Affection::Affected
                } else {
                    Affection::Unaffected
                };
                (format!("S{}", i), sex, aff)
            })
            .collect();
        let markers = (0..n_markers)
            .map(|m| {
                let chrom = if m % 5 == 4 { "X" } else { "3" };
                MarkerInfo::new(chrom, m as u64 * 100, format!("rs{}", m))
            })
            .collect();
        let genotypes = (0..n_markers)
            .map(|m| {
                (0..40)
                    .map(|s| {
                        // cases drift towards the minor allele on even markers
                        let shift = if m % 2 == 0 && s < 20 { 1 } else { 0 };
                        let code = (s * 7 + m * 3 + shift) % 4;
                        match code {
                            0 | 1 => [BASES[0], BASES[0]],
                            2 => [BASES[0], BASES[1]],
                            _ => [BASES[1], BASES[1]],
                        }
                    })
                    .collect()
            })
            .collect();

        let refs: Vec<(&str, Sex, Affection)> =
            samples.iter().map(|(id, s, a)| (id.as_str(), *s, *a)).collect();
        memory_source(&refs, markers, genotypes)
    }

    #[test]
    fn test_full_chain() {
        let mut source = study(25);
        let store = OperationStore::in_memory();
        let ctx = PipelineContext::new(&store);
        let (qa_markers, qa_samples) = run_qa(&mut source, &ctx);

        let request = CensusRequest::new(&qa_markers, &qa_samples).with_thresholds(permissive());
        let census_key = run_census(&mut source, &request, &ctx)
            .unwrap()
            .key()
            .unwrap()
            .to_string();
        let census = store.open::<CensusEntry>(&census_key).unwrap();
        assert_eq!(census.n_entries(), 25);
        assert_eq!(census.metadata().parent, qa_markers);

        for c in census.census_by_category(CensusCategory::All).unwrap() {
            assert_eq!(c.total(), 40);
        }
        let entries = census.get_entries(EntryRange::ALL).unwrap();
        for e in &entries {
            let c = &e.census;
            assert_eq!(c.case.called() + c.control.called(), c.all.called());
            if e.chromosome.is_sex_linked() {
                assert_eq!(c.alternate.called(), 0);
            } else {
                assert_eq!(c.alternate, c.control);
            }
        }

        let hw_key = run_hardy_weinberg(&census_key, &ctx)
            .unwrap()
            .key()
            .unwrap()
            .to_string();
        let hw = store.open::<HardyWeinbergEntry>(&hw_key).unwrap();
        assert_eq!(hw.n_entries(), 25);
        let alt_p = hw.alternate_p_values().unwrap();
        for (e, p) in entries.iter().zip(&alt_p) {
            if e.chromosome.is_sex_linked() {
                assert!(p.is_nan());
            } else {
                assert!((0.0..=1.0).contains(p));
            }
        }

        for test in [
            AssociationTest::Allelic,
            AssociationTest::Genotypic,
            AssociationTest::Trend,
        ] {
            let request = AssociationRequest::new(&census_key, &hw_key, test).with_hw_threshold(0.0);
            let outcome = run_association(&request, &ctx).unwrap();
            let ds = store.open::<AssociationEntry>(outcome.key().unwrap()).unwrap();
            assert_eq!(ds.n_entries(), 25);
            assert_eq!(ds.metadata().parent, census_key);
            for p in ds.p_values().unwrap() {
                assert!(p.is_nan() || (0.0..=1.0).contains(&p));
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let store = OperationStore::in_memory();
        let mut keys = Vec::new();
        for parallel in [false, true] {
            let mut source = study(60);
            let config = PipelineConfig {
                max_markers_in_memory: 16,
                parallel,
            };
            let ctx = PipelineContext::new(&store).with_config(config);
            let (qa_markers, qa_samples) = run_qa(&mut source, &ctx);
            let request =
                CensusRequest::new(&qa_markers, &qa_samples).with_thresholds(permissive());
            keys.push(
                run_census(&mut source, &request, &ctx)
                    .unwrap()
                    .key()
                    .unwrap()
                    .to_string(),
            );
        }
        assert_ne!(keys[0], keys[1]);
        assert_eq!(census_entries(&store, &keys[0]), census_entries(&store, &keys[1]));
    }

    #[test]
    fn test_directory_store_with_small_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = OperationStore::directory(dir.path()).unwrap();
        // 37 markers with batches of 16: the last batch is short
        let config = PipelineConfig {
            max_markers_in_memory: 16,
            parallel: false,
        };
        let ctx = PipelineContext::new(&store).with_config(config);
        let mut source = study(37);
        let (qa_markers, qa_samples) = run_qa(&mut source, &ctx);
        let request = CensusRequest::new(&qa_markers, &qa_samples).with_thresholds(permissive());
        let census_key = run_census(&mut source, &request, &ctx)
            .unwrap()
            .key()
            .unwrap()
            .to_string();
        let hw_key = run_hardy_weinberg(&census_key, &ctx)
            .unwrap()
            .key()
            .unwrap()
            .to_string();

        // a fresh store over the same directory sees every dataset
        let reopened = OperationStore::directory(dir.path()).unwrap();
        let kinds: Vec<OperationKind> = reopened
            .list()
            .unwrap()
            .into_iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(kinds.len(), 4);
        assert!(kinds.contains(&OperationKind::HardyWeinberg));

        let census = reopened.open::<CensusEntry>(&census_key).unwrap();
        assert_eq!(census.n_entries(), 37);
        let tail = census.get_entries(EntryRange::new(32, 37)).unwrap();
        assert_eq!(
            tail.iter().map(|e| e.index).collect::<Vec<_>>(),
            vec![32, 33, 34, 35, 36]
        );

        let in_memory = {
            let store = OperationStore::in_memory();
            let ctx = PipelineContext::new(&store);
            let mut source = study(37);
            let (qm, qs) = run_qa(&mut source, &ctx);
            let request = CensusRequest::new(&qm, &qs).with_thresholds(permissive());
            let key = run_census(&mut source, &request, &ctx).unwrap();
            census_entries(&store, key.key().unwrap())
        };
        assert_eq!(census.get_entries(EntryRange::ALL).unwrap(), in_memory);

        let hw = reopened.open::<HardyWeinbergEntry>(&hw_key).unwrap();
        assert_eq!(hw.metadata().parent, census_key);
        assert_eq!(hw.control_p_values().unwrap().len(), 37);
    }
}

mod plink_chain {
    use super::*;

    /// PLINK 2-bit codes, one per sample.
    const HOM1: u8 = 0b00;
    const MISS: u8 = 0b01;
    const HET: u8 = 0b10;
    const HOM2: u8 = 0b11;

    fn pack(codes: &[u8]) -> Vec<u8> {
        codes
            .chunks(4)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &code)| byte | (code << (2 * i)))
            })
            .collect()
    }

    fn write_fileset(dir: &Path) -> PathBuf {
        let base = dir.join("study");
        let mut fam = std::fs::File::create(base.with_extension("fam")).unwrap();
        for i in 0..8 {
            let sex = if i % 2 == 0 { 1 } else { 2 };
            let pheno = if i < 4 { 2 } else { 1 };
            writeln!(fam, "F{} S{} 0 0 {} {}", i, i, sex, pheno).unwrap();
        }

        let mut bim = std::fs::File::create(base.with_extension("bim")).unwrap();
        writeln!(bim, "1 rs1 0 100 A G").unwrap();
        writeln!(bim, "23 rs2 0 200 C T").unwrap();
        writeln!(bim, "2 rs3 0 300 A C").unwrap();

        let markers: [[u8; 8]; 3] = [
            [HOM1, HET, HOM1, HOM2, HOM1, HOM1, HET, HOM1],
            [HOM1, HOM1, HET, HOM1, HOM2, HOM1, HOM1, HET],
            [HET, HOM1, HOM2, HOM1, HOM1, MISS, HOM1, HOM1],
        ];
        let mut bed = vec![0x6C, 0x1B, 0x01];
        for codes in &markers {
            bed.extend(pack(codes));
        }
        std::fs::write(base.with_extension("bed"), bed).unwrap();
        base
    }

    #[test]
    fn test_plink_fileset_chain() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_fileset(dir.path());
        let mut source = StudySource::from_plink(&base).unwrap();
        assert_eq!(source.name, "study");

        let store = OperationStore::in_memory();
        let ctx = PipelineContext::new(&store);
        let (qa_markers, qa_samples) = run_qa(&mut source, &ctx);

        let qa = store.open::<QaMarkersEntry>(&qa_markers).unwrap();
        assert_eq!(qa.metadata().parent, "study");
        assert_eq!(
            qa.known_alleles().unwrap(),
            vec![(b'A', b'G'), (b'C', b'T'), (b'A', b'C')]
        );
        let missing = qa.missing_ratios().unwrap();
        assert_eq!(missing[2], 1.0 / 8.0);

        // S5 misses one call in three
        let samples = store.open::<QaSamplesEntry>(&qa_samples).unwrap();
        let ratios = samples.missing_ratios().unwrap();
        assert!((ratios[5] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(samples.sample_keys().unwrap()[5], "F5:S5");

        let thresholds = CensusThresholds {
            marker_missing_ratio_max: 0.2,
            sample_missing_ratio_max: 0.2,
            ..permissive()
        };
        let request = CensusRequest::new(&qa_markers, &qa_samples).with_thresholds(thresholds);
        let census_key = run_census(&mut source, &request, &ctx)
            .unwrap()
            .key()
            .unwrap()
            .to_string();
        let entries = census_entries(&store, &census_key);
        assert_eq!(entries.len(), 3);
        for e in &entries {
            assert_eq!(e.census.all.total(), 7);
        }
        // rs1 without S5: cases S0..S3 = AA, AG, AA, GG
        let rs1 = &entries[0].census;
        assert_eq!((rs1.case.hom_major, rs1.case.het, rs1.case.hom_minor), (2, 1, 1));
        assert_eq!((rs1.control.hom_major, rs1.control.het), (2, 1));

        let hw_key = run_hardy_weinberg(&census_key, &ctx)
            .unwrap()
            .key()
            .unwrap()
            .to_string();
        let request = AssociationRequest::new(&census_key, &hw_key, AssociationTest::Trend)
            .with_hw_threshold(0.0);
        let outcome = run_association(&request, &ctx).unwrap();
        assert!(matches!(outcome, PipelineOutcome::Completed { n_entries: 3, .. }));
    }

    #[test]
    fn test_phenotype_override_changes_case_control_split() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_fileset(dir.path());
        let override_path = dir.path().join("override.txt");
        std::fs::write(
            &override_path,
            "SampleID\tSex\tAffection\nS0\t1\t1\nS1\t2\t1\nS2\t1\t1\nS3\t2\t1\n",
        )
        .unwrap();

        let mut source = StudySource::from_plink(&base)
            .unwrap()
            .with_override_file(&override_path)
            .unwrap();
        let store = OperationStore::in_memory();
        let ctx = PipelineContext::new(&store);
        let (qa_markers, qa_samples) = run_qa(&mut source, &ctx);
        let request = CensusRequest::new(&qa_markers, &qa_samples).with_thresholds(permissive());
        let key = run_census(&mut source, &request, &ctx).unwrap();

        // every sample is now a control
        for e in census_entries(&store, key.key().unwrap()) {
            assert_eq!(e.census.case.called(), 0);
            assert_eq!(e.census.control.called(), e.census.all.called());
        }
        // the stored registry is untouched
        assert_eq!(
            source.registry.get(&SampleKey::of_sample("S0")).unwrap().affection,
            Affection::Affected
        );
    }
}
