//! Example configuration payloads printed by `--example`.

/// Example `prod.ini` for the production profile.
pub const PRODUCTION_EXAMPLE: &str = r#"; Options may live in [all] or in the section named after the process.
; Process-specific options replace the ones from [all]; command line
; options replace both.

[all]
; Only plan and log the transformations, never submit them
;dryrun = true

; Selects the [Chain] section below (or pass the process on the command line)
process = Chain

softwareVersion = J17v1r1

prodName = JUNOProdTest
; Appended to prodName to avoid transformation name clashes
;prodNameSuffix = _new

transGroup = JUNO_prod_test

; Restrict the run to one tag; "tags" is ignored when set
;tag = e+_0.0MeV

; Pattern applied (case-insensitively) to each tag.
; Positional groups are available as {0}, {1} in "<application>-mode"
tagParser = (.*)_(.*)MeV
; Named groups are available as {particle}, {momentum}
;tagParser = (?P<particle>.*)_(?P<momentum>.*)MeV

; Statements rewriting paramList / paramDict, one per line or separated by ";"
;tagParamConverter = paramDict['particle'] = 'e+'
;    paramDict['momentum'] = float(paramDict['momentum']) * 1000

; What to do when the converter fails for a tag: skip | abort
;onTagError = skip

; production -> /<vo>/production, otherwise /<vo>/user/<u>/<user>
;outputType = production
outputSubDir = prod/test001

;outputSE = IHEP-STORM
; "closest" uploads to the closest SE, falling back to outputSE
outputMode = closest

; All available sites are used when empty
;site = GRID.INFN-CNAF.it CLOUD.JINRONE.ru GRID.IN2P3.fr

moveFlavor = Replication
;moveFlavor = Moving
;moveGroupSize = 10
;moveSourceSE = IHEP-STORM CNAF-STORM
moveTargetSE = IHEP-STORM
movePlugin = Broadcast

; Skip workflow steps or data movement entirely
;ignoreWorkflow = true
;ignoreMove = true


[Chain]
seed = 42
evtmax = 2
njobs = 10
tags = e+_0.0MeV e+_1.398MeV e+_4.460MeV

; Output goes to /<root>/<outputSubDir>/<softwareVersion>/<workDir>/<position>
workDir = Positron01
position = center

workflow = detsim elecsim calib rec
moveType = detsim
detsim-mode = gun --particles {0} --momentums {1} --positions 0 0 0


[ChainNew]
seed = 42
evtmax = 5
njobs = 2
tags = e+_0.0MeV e+_1.398MeV
tagParser = (?P<particle>.*)_(?P<momentum>.*)MeV

workDir = PositronNew01
position = center

workflow = detsim elecsim
moveType = detsim elecsim
detsim-mode = gun --particles {particle} --momentums {momentum} --positions 0 0 0
"#;

/// Example `rec.ini` for the reconstruction profile.
pub const RECONSTRUCTION_EXAMPLE: &str = r#"; Options may live in [all] or in the section named after the process.
; Process-specific options replace the ones from [all]; command line
; options replace both.

[all]
;dryrun = true
process = Chain
softwareVersion = J17v1r1

prodName = JUNORecTest
;prodNameSuffix = _new
transGroup = JUNO_rec_test

; reconstruction -> /<vo>/reconstruction, otherwise /<vo>/user/<u>/<user>
;outputType = reconstruction
outputSubDir = rec/test001

;outputSE = IHEP-STORM
outputMode = closest

;site = GRID.INFN-CNAF.it CLOUD.JINRONE.ru GRID.IN2P3.fr
;bannedsite = GRID.IHEP.cn

; Maximum number of files per output directory
;max2dir = 10000

moveFlavor = Replication
moveTargetSE = IHEP-STORM
movePlugin = Broadcast


[Chain]
; Tags of the simulation output to reconstruct
tags = e+_0.0MeV

; Metadata query selecting the simulation files; "tag" is added per tag
inputQuery = {"dirName": "ML-prd03_i", "application": "detsim", "userdata": "0"}

; Output goes to /<root>/<outputSubDir>/<softwareVersion>/<workDir>/<tag>/<application>
workDir = positron/uniform

;workflow = elecsim calib rec
workflow = elecsim_rec
moveType = elecsim_rec
elecsim_rec-mode = --disablePmtTTS
"#;
